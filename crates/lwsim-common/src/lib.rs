//! # lwsim-common
//!
//! Common types and traits for the lwsim simulation substrate.
//!
//! This crate provides the event-driven scheduling boundary the accounting
//! core runs against:
//! - Time representation ([`SimTime`])
//! - Cartesian positions ([`Position`])
//! - Identifiers ([`EntityId`], [`DeviceId`], [`GatewayId`], [`PacketId`])
//! - Decoded packet metadata ([`PacketMeta`], [`MacMessageType`])
//! - Event system ([`Event`], [`EventPayload`])
//! - Simulation context with cancelable scheduling ([`SimContext`])
//! - Entity traits ([`Entity`], [`EntityRegistry`])

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Simulation errors.
#[derive(Debug, Error)]
pub enum SimError {
    /// Entity not found.
    #[error("Entity not found: {0:?}")]
    EntityNotFound(EntityId),

    /// Event handler error.
    #[error("Event handler error in entity {entity:?}: {message}")]
    HandlerError {
        /// Entity that had the error.
        entity: EntityId,
        /// Error message.
        message: String,
    },
}

// ============================================================================
// Time Types
// ============================================================================

/// Simulation time in microseconds since simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// Zero time.
    pub const ZERO: SimTime = SimTime(0);

    /// Create from microseconds.
    pub fn from_micros(us: u64) -> Self {
        SimTime(us)
    }

    /// Create from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        SimTime(ms * 1000)
    }

    /// Create from seconds (float).
    pub fn from_secs(s: f64) -> Self {
        SimTime((s * 1_000_000.0) as u64)
    }

    /// Create from whole hours.
    pub fn from_hours(h: u64) -> Self {
        SimTime(h * 3_600_000_000)
    }

    /// Get as microseconds.
    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get as milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0 / 1000
    }

    /// Get as seconds (float).
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Add duration to time, checking for overflow.
    pub fn checked_add(&self, duration: SimTime) -> Option<SimTime> {
        self.0.checked_add(duration.0).map(SimTime)
    }
}

impl std::ops::Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Self) -> Self::Output {
        SimTime(self.0 + rhs.0)
    }
}

impl std::ops::Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Self) -> Self::Output {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

// ============================================================================
// Position Types
// ============================================================================

/// Cartesian position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate in meters.
    pub x: f64,
    /// Y coordinate in meters.
    pub y: f64,
    /// Z coordinate (height) in meters.
    pub z: f64,
}

impl Position {
    /// Create a new position.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Position { x, y, z }
    }

    /// Euclidean distance to another position in meters.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

// ============================================================================
// Identifier Types
// ============================================================================

/// Unique identifier for an entity in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Create a new entity ID.
    pub fn new(id: u64) -> Self {
        EntityId(id)
    }
}

/// End-device index within the simulated network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// Index into per-device collections.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ed{}", self.0)
    }
}

/// Gateway index within the simulated network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GatewayId(pub u32);

impl GatewayId {
    /// Index into per-gateway collections.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for GatewayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gw{}", self.0)
    }
}

/// Payload-level unique packet identifier.
///
/// Assigned once at send time from a monotonically increasing counter and
/// carried as packet metadata through the simulated network. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketId(pub u32);

// ============================================================================
// Packet Metadata
// ============================================================================

/// LoRaWAN MAC message type, as decoded from the MHDR by the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacMessageType {
    /// Join-request uplink.
    JoinRequest,
    /// Join-accept downlink.
    JoinAccept,
    /// Unconfirmed data uplink.
    UnconfirmedDataUp,
    /// Confirmed data uplink.
    ConfirmedDataUp,
    /// Unconfirmed data downlink.
    UnconfirmedDataDown,
    /// Confirmed data downlink.
    ConfirmedDataDown,
}

impl MacMessageType {
    /// True for uplink data message types.
    pub fn is_uplink(&self) -> bool {
        matches!(
            self,
            MacMessageType::UnconfirmedDataUp | MacMessageType::ConfirmedDataUp
        )
    }

    /// True for downlink data message types.
    pub fn is_downlink(&self) -> bool {
        matches!(
            self,
            MacMessageType::UnconfirmedDataDown | MacMessageType::ConfirmedDataDown
        )
    }
}

/// Decoded metadata for one transmitted frame.
///
/// This is the explicit tagged representation produced by the (external)
/// protocol-decoding layer: the accounting core never inspects raw bytes or
/// downcasts packet objects, it only reads this struct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacketMeta {
    /// Payload-level unique id. Downlink frames generated by gateways carry
    /// no application id, so this is optional.
    pub id: Option<PacketId>,
    /// PHY payload size in bytes.
    pub payload_size: usize,
    /// Spreading factor the frame was sent with (7-12).
    pub spreading_factor: u8,
    /// Center frequency in Hz.
    pub frequency_hz: u32,
    /// Decoded MAC message type.
    pub message_type: MacMessageType,
    /// Frame-header acknowledgment flag.
    pub ack: bool,
}

// ============================================================================
// Event Types
// ============================================================================

/// Unique identifier for a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

/// A simulation event.
#[derive(Debug, Clone)]
pub struct Event {
    /// Unique event ID.
    pub id: EventId,
    /// Time when the event occurs.
    pub time: SimTime,
    /// Entity that created the event.
    pub source: EntityId,
    /// Target entities for the event.
    pub targets: Vec<EntityId>,
    /// Event payload.
    pub payload: EventPayload,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering for min-heap (earliest time first). Events at the
        // same instant run in posting order (event id).
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.0.cmp(&self.id.0))
    }
}

/// An end device started transmitting an uplink frame.
#[derive(Debug, Clone)]
pub struct DeviceTxEvent {
    /// Transmitting end device.
    pub device: DeviceId,
    /// Decoded frame metadata.
    pub meta: PacketMeta,
    /// When the transmission ends.
    pub end_time: SimTime,
}

/// A gateway started transmitting a downlink frame.
#[derive(Debug, Clone)]
pub struct GatewayTxEvent {
    /// Transmitting gateway.
    pub gateway: GatewayId,
    /// Decoded frame metadata.
    pub meta: PacketMeta,
    /// When the transmission ends.
    pub end_time: SimTime,
}

/// A frame was successfully received by a gateway.
#[derive(Debug, Clone)]
pub struct GatewayRxEvent {
    /// Receiving gateway.
    pub gateway: GatewayId,
    /// Decoded frame metadata.
    pub meta: PacketMeta,
}

/// Event payload variants.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// An end device started an uplink transmission.
    DeviceTxStart(DeviceTxEvent),
    /// A gateway started a downlink transmission.
    GatewayTxStart(GatewayTxEvent),
    /// A gateway completed reception of a frame.
    GatewayRx(GatewayRxEvent),
    /// A delayed callback.
    Timer {
        /// User-defined timer ID.
        timer_id: u64,
    },
    /// End the simulation.
    SimulationEnd,
}

// ============================================================================
// Simulation Context
// ============================================================================

/// Context passed to entities during event handling.
///
/// Entities schedule future work through [`SimContext::post_event`] and may
/// cancel a previously posted event by its [`EventId`]; the event loop drains
/// both the pending events and the cancellations after each dispatch.
pub struct SimContext {
    time: SimTime,
    rng: ChaCha8Rng,
    pending_events: Vec<Event>,
    cancellations: Vec<EventId>,
    next_event_id: u64,
    source_entity: EntityId,
}

impl SimContext {
    /// Create a new simulation context.
    pub fn new(seed: u64) -> Self {
        SimContext {
            time: SimTime::ZERO,
            rng: ChaCha8Rng::seed_from_u64(seed),
            pending_events: Vec::new(),
            cancellations: Vec::new(),
            next_event_id: 0,
            source_entity: EntityId(0),
        }
    }

    /// Get the current simulation time.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Get mutable access to the random number generator.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Set the current time (used by the event loop).
    pub fn set_time(&mut self, time: SimTime) {
        self.time = time;
    }

    /// Set the source entity (used by the event loop).
    pub fn set_source(&mut self, entity: EntityId) {
        self.source_entity = entity;
    }

    /// Post an event to occur after a delay. Returns the id of the scheduled
    /// event so the caller can cancel it later.
    pub fn post_event(
        &mut self,
        delay: SimTime,
        targets: Vec<EntityId>,
        payload: EventPayload,
    ) -> EventId {
        let id = EventId(self.next_event_id);
        self.next_event_id += 1;
        self.pending_events.push(Event {
            id,
            time: self.time + delay,
            source: self.source_entity,
            targets,
            payload,
        });
        id
    }

    /// Post an event to occur immediately (at the current time).
    pub fn post_immediate(&mut self, targets: Vec<EntityId>, payload: EventPayload) -> EventId {
        self.post_event(SimTime::ZERO, targets, payload)
    }

    /// Cancel a previously posted event. Canceling an event that already
    /// fired is a no-op.
    pub fn cancel_event(&mut self, id: EventId) {
        self.cancellations.push(id);
    }

    /// Take all pending events (used by the event loop).
    pub fn take_pending_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending_events)
    }

    /// Take all pending cancellations (used by the event loop).
    pub fn take_cancellations(&mut self) -> Vec<EventId> {
        std::mem::take(&mut self.cancellations)
    }
}

// ============================================================================
// Entity Trait
// ============================================================================

/// Base trait for all simulation entities.
pub trait Entity: Send {
    /// Get the entity's unique ID.
    fn entity_id(&self) -> EntityId;

    /// Handle an event.
    fn handle_event(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError>;
}

// ============================================================================
// Entity Registry
// ============================================================================

/// Registry for managing simulation entities.
pub struct EntityRegistry {
    entities: HashMap<EntityId, Box<dyn Entity>>,
}

impl EntityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        EntityRegistry {
            entities: HashMap::new(),
        }
    }

    /// Register an entity.
    pub fn register(&mut self, entity: Box<dyn Entity>) {
        let id = entity.entity_id();
        self.entities.insert(id, entity);
    }

    /// Dispatch an event to its target entities.
    pub fn dispatch_event(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError> {
        for target in &event.targets {
            match self.entities.get_mut(target) {
                Some(entity) => {
                    ctx.set_source(*target);
                    entity.handle_event(event, ctx)?;
                }
                None => return Err(SimError::EntityNotFound(*target)),
            }
        }
        Ok(())
    }

    /// Get all entity IDs.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Get the number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn test_sim_time_conversions() {
        let time = SimTime::from_secs(1.5);
        assert_eq!(time.as_millis(), 1500);
        assert_eq!(time.as_micros(), 1_500_000);
        assert!((time.as_secs_f64() - 1.5).abs() < 0.0001);
        assert_eq!(SimTime::from_hours(1).as_micros(), 3_600_000_000);
    }

    #[test]
    fn test_sim_time_arithmetic() {
        let t1 = SimTime::from_millis(100);
        let t2 = SimTime::from_millis(50);
        assert_eq!((t1 + t2).as_millis(), 150);
        assert_eq!((t1 - t2).as_millis(), 50);
        // Subtraction saturates at zero.
        assert_eq!((t2 - t1).as_micros(), 0);
    }

    #[test]
    fn test_position_distance() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
        let c = Position::new(1.0, 2.0, 2.0);
        assert!((a.distance_to(&c) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_event_ordering_same_instant_is_posting_order() {
        let mut ctx = SimContext::new(0);
        ctx.post_event(SimTime::from_secs(1.0), vec![], EventPayload::SimulationEnd);
        ctx.post_event(SimTime::ZERO, vec![], EventPayload::Timer { timer_id: 1 });
        ctx.post_event(SimTime::ZERO, vec![], EventPayload::Timer { timer_id: 2 });

        let mut heap: BinaryHeap<Event> = ctx.take_pending_events().into_iter().collect();
        let first = heap.pop().unwrap();
        let second = heap.pop().unwrap();
        let third = heap.pop().unwrap();

        assert!(matches!(first.payload, EventPayload::Timer { timer_id: 1 }));
        assert!(matches!(second.payload, EventPayload::Timer { timer_id: 2 }));
        assert!(matches!(third.payload, EventPayload::SimulationEnd));
    }

    #[test]
    fn test_context_cancellation_bookkeeping() {
        let mut ctx = SimContext::new(0);
        let id = ctx.post_event(SimTime::from_secs(5.0), vec![], EventPayload::Timer { timer_id: 7 });
        ctx.cancel_event(id);
        assert_eq!(ctx.take_cancellations(), vec![id]);
        assert!(ctx.take_cancellations().is_empty());
    }
}
