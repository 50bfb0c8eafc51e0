//! Scenario to entity-graph builder.
//!
//! Assembles the event loop from a [`Scenario`]: picks the worst-case device,
//! constructs the accounting core, registers channel/gateway/sender entities
//! and posts the initial timers (jittered first uplinks, optional
//! polling-boost window edges).

use lwsim_accounting::{furthest_device, ComplianceTracker, EpochScheduler};
use lwsim_common::{DeviceId, EntityId, EventPayload, GatewayId, Position, SimTime};
use rand::Rng;
use tracing::info;

use crate::channel::BroadcastChannel;
use crate::gateway::GatewayNode;
use crate::scenario::Scenario;
use crate::sender::{PeriodicSender, SenderTimers};
use crate::{EventLoop, RunnerError};

/// Timer id reserved for the epoch scheduler; sender timers start above it.
const EPOCH_TIMER_ID: u64 = 0;

/// Build a ready-to-run event loop from a scenario.
pub fn build_simulation(scenario: &Scenario) -> Result<EventLoop, RunnerError> {
    scenario.validate()?;

    let device_positions: Vec<Position> =
        scenario.devices.iter().map(|d| d.position()).collect();
    let reference = scenario.gateways[0].position();
    let furthest = furthest_device(&device_positions, reference);
    if let Some(index) = furthest {
        info!(
            device = index,
            distance_m = device_positions[index].distance_to(&reference),
            "tracking airtime of the furthest end device"
        );
    }

    let tracker = ComplianceTracker::new(scenario.accounting_config(), furthest)?;
    let scheduler = EpochScheduler::new(
        SimTime::from_secs(scenario.epoch_secs),
        scenario.horizon(),
        EPOCH_TIMER_ID,
    );
    let mut event_loop = EventLoop::new(scenario.seed, scenario.horizon(), tracker, scheduler);
    let issuer = event_loop.tracker().issuer();

    let channel_entity = EntityId(0);
    let gateway_entities: Vec<(GatewayId, EntityId)> = (0..scenario.gateways.len())
        .map(|g| (GatewayId(g as u32), EntityId(1 + g as u64)))
        .collect();
    for (gateway, entity_id) in &gateway_entities {
        event_loop.register(Box::new(GatewayNode::new(
            *entity_id,
            *gateway,
            scenario.rx2_frequency_hz,
        )));
    }

    let delivery_probability = scenario
        .devices
        .iter()
        .map(|d| d.delivery_probability)
        .collect();
    event_loop.register(Box::new(BroadcastChannel::new(
        channel_entity,
        gateway_entities.clone(),
        delivery_probability,
    )));

    let sender_base = 1 + scenario.gateways.len() as u64;
    for (index, device) in scenario.devices.iter().enumerate() {
        let entity_id = EntityId(sender_base + index as u64);
        let timers = SenderTimers {
            send: 1 + 3 * index as u64,
            boost_on: 2 + 3 * index as u64,
            boost_off: 3 + 3 * index as u64,
        };
        event_loop.register(Box::new(PeriodicSender::new(
            entity_id,
            DeviceId(index as u32),
            device.spreading_factor,
            scenario.payload_size,
            scenario.confirmed_uplinks,
            scenario.uplink_frequency_hz,
            SimTime::from_secs(scenario.uplink_period_secs),
            scenario
                .polling_boost
                .as_ref()
                .map(|b| SimTime::from_secs(b.period_secs)),
            timers,
            issuer.clone(),
            channel_entity,
        )));

        // Desynchronize the senders: first uplink lands somewhere within one
        // period, like staggered field deployments do.
        let jitter = event_loop.rng().gen_range(0.0..scenario.uplink_period_secs);
        event_loop.post(
            SimTime::from_secs(jitter),
            vec![entity_id],
            EventPayload::Timer {
                timer_id: timers.send,
            },
        );

        if let Some(boost) = &scenario.polling_boost {
            event_loop.post(
                SimTime::from_secs(boost.start_secs),
                vec![entity_id],
                EventPayload::Timer {
                    timer_id: timers.boost_on,
                },
            );
            event_loop.post(
                SimTime::from_secs(boost.end_secs),
                vec![entity_id],
                EventPayload::Timer {
                    timer_id: timers.boost_off,
                },
            );
        }
    }

    Ok(event_loop)
}
