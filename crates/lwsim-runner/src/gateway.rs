//! Gateway downlink behavior.
//!
//! A gateway answers every confirmed uplink it hears with an acknowledgment
//! downlink, one second after the uplink ends in the RX1 window (same channel
//! and spreading factor) or two seconds after in the RX2 window (dedicated
//! channel, SF12) for the slower spreading factors. This is the simplified
//! class-A reply policy of a network server that prefers RX1 while the data
//! rate is high enough.

use lwsim_common::{
    Entity, EntityId, Event, EventPayload, GatewayId, GatewayTxEvent, MacMessageType, PacketMeta,
    SimContext, SimError, SimTime,
};
use lwsim_phy::{time_on_air, RadioParams};
use tracing::trace;

/// Size of an empty acknowledgment downlink in bytes
/// (MHDR + DevAddr + FCtrl + FCnt + MIC).
const ACK_PAYLOAD_SIZE: usize = 12;

/// Highest spreading factor still answered in the RX1 window.
const RX1_MAX_SF: u8 = 9;

/// Spreading factor used on the RX2 channel.
const RX2_SF: u8 = 12;

/// Downlink reply behavior for one gateway.
pub struct GatewayNode {
    entity_id: EntityId,
    gateway: GatewayId,
    rx2_frequency_hz: u32,
}

impl GatewayNode {
    /// Create a gateway entity.
    pub fn new(entity_id: EntityId, gateway: GatewayId, rx2_frequency_hz: u32) -> Self {
        GatewayNode {
            entity_id,
            gateway,
            rx2_frequency_hz,
        }
    }

    fn send_ack(&self, uplink: &PacketMeta, ctx: &mut SimContext) {
        let (delay, frequency_hz, spreading_factor) = if uplink.spreading_factor <= RX1_MAX_SF {
            (SimTime::from_millis(1000), uplink.frequency_hz, uplink.spreading_factor)
        } else {
            (SimTime::from_millis(2000), self.rx2_frequency_hz, RX2_SF)
        };

        let meta = PacketMeta {
            id: None,
            payload_size: ACK_PAYLOAD_SIZE,
            spreading_factor,
            frequency_hz,
            message_type: MacMessageType::ConfirmedDataDown,
            ack: true,
        };
        let params = RadioParams::with_spreading_factor(spreading_factor);
        let toa = time_on_air(&params, ACK_PAYLOAD_SIZE);
        let end_time = ctx.time() + delay + SimTime::from_secs(toa);
        trace!(gateway = %self.gateway, uplink_id = ?uplink.id, "scheduling ack downlink");

        // No entity consumes downlinks; the event loop accounts for them.
        ctx.post_event(
            delay,
            Vec::new(),
            EventPayload::GatewayTxStart(GatewayTxEvent {
                gateway: self.gateway,
                meta,
                end_time,
            }),
        );
    }
}

impl Entity for GatewayNode {
    fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError> {
        if let EventPayload::GatewayRx(rx) = &event.payload {
            if rx.gateway == self.gateway
                && rx.meta.message_type == MacMessageType::ConfirmedDataUp
            {
                self.send_ack(&rx.meta, ctx);
            }
        }
        Ok(())
    }
}
