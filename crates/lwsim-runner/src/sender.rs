//! Periodic uplink sender.
//!
//! One sender per end device: it stamps each application packet with a fresh
//! unique id, posts the transmission to the channel and re-arms its own send
//! timer. An optional polling-boost window temporarily shortens the period;
//! entering and leaving the window cancels the pending send and restarts the
//! cadence immediately.

use lwsim_accounting::PacketIdIssuer;
use lwsim_common::{
    DeviceId, DeviceTxEvent, Entity, EntityId, Event, EventId, EventPayload, MacMessageType,
    PacketMeta, SimContext, SimError, SimTime,
};
use lwsim_phy::{time_on_air, RadioParams};
use tracing::trace;

/// Timer roles a sender distinguishes, mapped onto distinct timer ids by the
/// builder.
#[derive(Debug, Clone, Copy)]
pub struct SenderTimers {
    /// Fires one uplink and re-arms.
    pub send: u64,
    /// Switches to the boosted period.
    pub boost_on: u64,
    /// Restores the normal period.
    pub boost_off: u64,
}

/// Periodic uplink sender for one end device.
pub struct PeriodicSender {
    entity_id: EntityId,
    device: DeviceId,
    spreading_factor: u8,
    payload_size: usize,
    confirmed: bool,
    frequency_hz: u32,
    base_period: SimTime,
    period: SimTime,
    boost_period: Option<SimTime>,
    timers: SenderTimers,
    issuer: PacketIdIssuer,
    channel: EntityId,
    pending_send: Option<EventId>,
    packets_sent: u32,
}

impl PeriodicSender {
    /// Create a sender. The builder posts the first (jittered) send timer.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entity_id: EntityId,
        device: DeviceId,
        spreading_factor: u8,
        payload_size: usize,
        confirmed: bool,
        frequency_hz: u32,
        period: SimTime,
        boost_period: Option<SimTime>,
        timers: SenderTimers,
        issuer: PacketIdIssuer,
        channel: EntityId,
    ) -> Self {
        PeriodicSender {
            entity_id,
            device,
            spreading_factor,
            payload_size,
            confirmed,
            frequency_hz,
            base_period: period,
            period,
            boost_period,
            timers,
            issuer,
            channel,
            pending_send: None,
            packets_sent: 0,
        }
    }

    fn send_packet(&mut self, ctx: &mut SimContext) {
        let message_type = if self.confirmed {
            MacMessageType::ConfirmedDataUp
        } else {
            MacMessageType::UnconfirmedDataUp
        };
        let meta = PacketMeta {
            id: Some(self.issuer.next_id()),
            payload_size: self.payload_size,
            spreading_factor: self.spreading_factor,
            frequency_hz: self.frequency_hz,
            message_type,
            ack: false,
        };

        let params = RadioParams::with_spreading_factor(self.spreading_factor);
        let toa = time_on_air(&params, self.payload_size);
        let end_time = ctx.time() + SimTime::from_secs(toa);
        trace!(device = %self.device, id = ?meta.id, toa_secs = toa, "uplink transmission");

        ctx.post_immediate(
            vec![self.channel],
            EventPayload::DeviceTxStart(DeviceTxEvent {
                device: self.device,
                meta,
                end_time,
            }),
        );
        self.packets_sent += 1;
        self.schedule_next(ctx, self.period);
    }

    fn schedule_next(&mut self, ctx: &mut SimContext, delay: SimTime) {
        self.pending_send = Some(ctx.post_event(
            delay,
            vec![self.entity_id],
            EventPayload::Timer {
                timer_id: self.timers.send,
            },
        ));
    }

    /// Cancel the pending send and restart the cadence at the given period,
    /// beginning with an immediate uplink.
    fn restart_with_period(&mut self, ctx: &mut SimContext, period: SimTime) {
        if let Some(id) = self.pending_send.take() {
            ctx.cancel_event(id);
        }
        self.period = period;
        self.schedule_next(ctx, SimTime::ZERO);
    }

    /// Packets sent so far.
    pub fn packets_sent(&self) -> u32 {
        self.packets_sent
    }
}

impl Entity for PeriodicSender {
    fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError> {
        if let EventPayload::Timer { timer_id } = event.payload {
            if timer_id == self.timers.send {
                self.send_packet(ctx);
            } else if timer_id == self.timers.boost_on {
                if let Some(boost) = self.boost_period {
                    trace!(device = %self.device, "entering polling boost window");
                    self.restart_with_period(ctx, boost);
                }
            } else if timer_id == self.timers.boost_off {
                trace!(device = %self.device, "leaving polling boost window");
                let base = self.base_period;
                self.restart_with_period(ctx, base);
            }
        }
        Ok(())
    }
}
