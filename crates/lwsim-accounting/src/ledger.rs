//! Packet attribution and deduplication ledger.
//!
//! The ledger assigns unique ids to outgoing packets, records which end
//! device sent each one, deduplicates receptions (several gateways may hear
//! the same uplink), and maintains the per-spreading-factor, per-node and
//! per-gateway counters reported at the end of a run.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use lwsim_common::{DeviceId, GatewayId, PacketId};
use lwsim_metrics::metric_defs;
use lwsim_phy::sf_index;
use tracing::{debug, warn};

/// Cloneable handle that issues process-wide unique packet ids.
///
/// Ids start at 1 and increase monotonically; the handle is cheap to clone so
/// every sender can stamp packets without routing through the ledger. The
/// counter is atomic only to make the handle shareable, not because the
/// engine is concurrent.
#[derive(Debug, Clone, Default)]
pub struct PacketIdIssuer(Arc<AtomicU32>);

impl PacketIdIssuer {
    /// Create a fresh issuer starting at id 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next unused packet id.
    pub fn next_id(&self) -> PacketId {
        PacketId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Packet attribution and deduplication state for one simulation run.
pub struct PacketLedger {
    issuer: PacketIdIssuer,
    /// Sent frames per spreading factor, index `sf - 7`.
    sent_per_sf: [u64; 6],
    /// Uniquely received frames per spreading factor, index `sf - 7`.
    received_per_sf: [u64; 6],
    /// Packet id -> originating end device. Never pruned during a run.
    sender_map: HashMap<PacketId, DeviceId>,
    /// Packet ids already counted as received.
    received_ids: HashSet<PacketId>,
    /// Unique receptions attributed per end device.
    received_per_node: Vec<u64>,
    /// Acknowledgments transmitted per gateway.
    acks_per_gateway: Vec<u64>,
}

impl PacketLedger {
    /// Create an empty ledger for the given network size.
    pub fn new(device_count: usize, gateway_count: usize) -> Self {
        PacketLedger {
            issuer: PacketIdIssuer::new(),
            sent_per_sf: [0; 6],
            received_per_sf: [0; 6],
            sender_map: HashMap::new(),
            received_ids: HashSet::new(),
            received_per_node: vec![0; device_count],
            acks_per_gateway: vec![0; gateway_count],
        }
    }

    /// Cloneable id source backed by this ledger's counter.
    pub fn issuer(&self) -> PacketIdIssuer {
        self.issuer.clone()
    }

    /// Return the next unused packet id.
    pub fn issue_packet_id(&self) -> PacketId {
        self.issuer.next_id()
    }

    /// Record an uplink transmission.
    ///
    /// The sender attribution is stored for later reception accounting; the
    /// per-SF sent counter is incremented only for valid spreading factors,
    /// otherwise the count is dropped with a warning. A repeated packet id
    /// indicates a caller bug: it is reported loudly but tolerated, and the
    /// newer attribution wins.
    pub fn record_transmission(&mut self, id: Option<PacketId>, sender: DeviceId, sf: u8) {
        match sf_index(sf) {
            Some(index) => {
                self.sent_per_sf[index] += 1;
                let labels = [("sf", sf.to_string())];
                metrics::counter!(metric_defs::PHY_TX_PACKETS.name, &labels).increment(1);
            }
            None => {
                warn!(sf, %sender, "transmission with out-of-range SF not counted");
            }
        }

        if let Some(id) = id {
            if let Some(previous) = self.sender_map.insert(id, sender) {
                debug_assert!(false, "packet id {:?} issued twice", id);
                warn!(?id, %previous, %sender, "duplicate packet id issuance, keeping newer sender");
            }
        }
    }

    /// Record a reception, counting each packet id at most once.
    ///
    /// A packet id that was already counted is ignored entirely: the same
    /// uplink heard by a second gateway (or relayed over two paths) must not
    /// inflate any counter. An id with no recorded sender is logged and
    /// counted without per-node attribution; this happens when ledger state
    /// was reset mid-run and must be tolerated.
    pub fn record_reception(&mut self, id: PacketId, sf: u8) {
        if !self.received_ids.insert(id) {
            metrics::counter!(metric_defs::PHY_RX_DUPLICATE.name).increment(1);
            return;
        }

        if let Some(index) = sf_index(sf) {
            self.received_per_sf[index] += 1;
            let labels = [("sf", sf.to_string())];
            metrics::counter!(metric_defs::PHY_RX_PACKETS.name, &labels).increment(1);
        } else {
            warn!(sf, ?id, "reception with out-of-range SF not counted per SF");
        }
        metrics::counter!(metric_defs::PHY_RX_UNIQUE.name).increment(1);

        match self.sender_map.get(&id) {
            Some(sender) if sender.index() < self.received_per_node.len() => {
                self.received_per_node[sender.index()] += 1;
                let labels = [("node", sender.to_string())];
                metrics::counter!(metric_defs::NODE_RX_DELIVERED.name, &labels).increment(1);
            }
            Some(sender) => {
                warn!(%sender, ?id, "sender index out of range, skipping attribution");
            }
            None => {
                debug!(?id, "reception with unknown packet id, skipping attribution");
            }
        }
    }

    /// Record an acknowledgment transmitted by a gateway.
    pub fn record_ack(&mut self, gateway: GatewayId) {
        if gateway.index() >= self.acks_per_gateway.len() {
            self.acks_per_gateway.resize(gateway.index() + 1, 0);
        }
        self.acks_per_gateway[gateway.index()] += 1;
        let labels = [("gateway", gateway.to_string())];
        metrics::counter!(metric_defs::GATEWAY_ACKS.name, &labels).increment(1);
    }

    /// Sent frames per spreading factor (SF7..SF12).
    pub fn sent_per_sf(&self) -> &[u64; 6] {
        &self.sent_per_sf
    }

    /// Uniquely received frames per spreading factor (SF7..SF12).
    pub fn received_per_sf(&self) -> &[u64; 6] {
        &self.received_per_sf
    }

    /// Unique receptions attributed per end device.
    pub fn received_per_node(&self) -> &[u64] {
        &self.received_per_node
    }

    /// Acknowledgments transmitted per gateway.
    pub fn acks_per_gateway(&self) -> &[u64] {
        &self.acks_per_gateway
    }

    /// Total number of unique packet ids received.
    pub fn unique_received(&self) -> usize {
        self.received_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_ids_are_distinct_and_increasing() {
        let ledger = PacketLedger::new(1, 1);
        let mut previous = PacketId(0);
        for _ in 0..100 {
            let id = ledger.issue_packet_id();
            assert!(id > previous);
            previous = id;
        }
        assert_eq!(ledger.issuer().issued(), 100);
    }

    #[test]
    fn test_issuer_clones_share_the_counter() {
        let ledger = PacketLedger::new(1, 1);
        let a = ledger.issuer();
        let b = ledger.issuer();
        let id_a = a.next_id();
        let id_b = b.next_id();
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn test_reception_is_idempotent() {
        let mut ledger = PacketLedger::new(2, 1);
        let id = ledger.issue_packet_id();
        ledger.record_transmission(Some(id), DeviceId(1), 7);

        ledger.record_reception(id, 7);
        ledger.record_reception(id, 7);

        assert_eq!(ledger.received_per_sf()[0], 1);
        assert_eq!(ledger.received_per_node(), &[0, 1]);
        assert_eq!(ledger.unique_received(), 1);
    }

    #[test]
    fn test_unknown_packet_id_is_tolerated() {
        let mut ledger = PacketLedger::new(2, 1);
        ledger.record_reception(PacketId(999), 8);

        // Counted per SF and as unique, but attributed to no node.
        assert_eq!(ledger.received_per_sf()[1], 1);
        assert_eq!(ledger.received_per_node(), &[0, 0]);
        assert_eq!(ledger.unique_received(), 1);
    }

    #[test]
    fn test_out_of_range_sf_transmission_dropped() {
        let mut ledger = PacketLedger::new(1, 1);
        let id = ledger.issue_packet_id();
        ledger.record_transmission(Some(id), DeviceId(0), 13);

        assert_eq!(ledger.sent_per_sf(), &[0; 6]);
        // Attribution still happens, so a later reception can be credited.
        ledger.record_reception(id, 7);
        assert_eq!(ledger.received_per_node(), &[1]);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_duplicate_id_issuance_keeps_newer_sender() {
        let mut ledger = PacketLedger::new(3, 1);
        let id = PacketId(5);
        ledger.record_transmission(Some(id), DeviceId(0), 7);
        ledger.record_transmission(Some(id), DeviceId(2), 7);

        ledger.record_reception(id, 7);
        assert_eq!(ledger.received_per_node(), &[0, 0, 1]);
    }

    #[test]
    fn test_ack_counter_grows_for_unknown_gateway() {
        let mut ledger = PacketLedger::new(1, 1);
        ledger.record_ack(GatewayId(0));
        ledger.record_ack(GatewayId(2));
        assert_eq!(ledger.acks_per_gateway(), &[1, 0, 1]);
    }
}
