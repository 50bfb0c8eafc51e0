//! Broadcast channel between devices and gateways.
//!
//! The channel decides, per gateway, whether an uplink is heard, using the
//! per-device delivery probability from the scenario. Propagation modeling is
//! deliberately absent; the probability stands in for the link budget. A
//! delivered copy arrives when the transmission ends, so several gateways can
//! hear the same frame and exercise the deduplication layer.

use lwsim_common::{
    Entity, EntityId, Event, EventPayload, GatewayId, GatewayRxEvent, SimContext, SimError,
};
use rand::Rng;

/// Routes device transmissions to gateways.
pub struct BroadcastChannel {
    entity_id: EntityId,
    /// Gateway id together with the entity that models it.
    gateways: Vec<(GatewayId, EntityId)>,
    /// Per-device probability that a gateway hears an uplink.
    delivery_probability: Vec<f64>,
}

impl BroadcastChannel {
    /// Create a channel for the given gateways and per-device link quality.
    pub fn new(
        entity_id: EntityId,
        gateways: Vec<(GatewayId, EntityId)>,
        delivery_probability: Vec<f64>,
    ) -> Self {
        BroadcastChannel {
            entity_id,
            gateways,
            delivery_probability,
        }
    }
}

impl Entity for BroadcastChannel {
    fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError> {
        if let EventPayload::DeviceTxStart(tx) = &event.payload {
            let probability = self
                .delivery_probability
                .get(tx.device.index())
                .copied()
                .unwrap_or(1.0);
            let delay = tx.end_time - ctx.time();
            for (gateway, target) in self.gateways.clone() {
                if ctx.rng().gen::<f64>() < probability {
                    ctx.post_event(
                        delay,
                        vec![target],
                        EventPayload::GatewayRx(GatewayRxEvent {
                            gateway,
                            meta: tx.meta,
                        }),
                    );
                }
            }
        }
        Ok(())
    }
}
