//! # lwsim-runner library
//!
//! Library interface for the lwsim compliance simulation runner.
//!
//! The [`EventLoop`] owns the event heap, the entity registry and the
//! accounting core. Entities (periodic senders, the broadcast channel,
//! gateways) communicate only through posted events; the loop itself taps
//! every transmission and reception event into the
//! [`ComplianceTracker`](lwsim_accounting::ComplianceTracker) and drives the
//! epoch timer, mirroring how the accounting callbacks hang off the PHY
//! trace sources in a real deployment.
//!
//! All callbacks run on one logical timeline: events at the same simulated
//! instant are processed in posting order, and the loop stops once the next
//! event lies beyond the configured horizon.

pub mod build_model;
pub mod channel;
pub mod gateway;
pub mod report;
pub mod scenario;
pub mod sender;

use std::collections::{BinaryHeap, HashSet};

use lwsim_accounting::{ComplianceReport, ComplianceTracker, EpochScheduler};
use lwsim_common::{
    Entity, EntityRegistry, Event, EventId, EventPayload, SimContext, SimError, SimTime,
};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::debug;

pub use build_model::build_simulation;
pub use report::SummaryReport;
pub use scenario::Scenario;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while building or running a simulation.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Simulation error.
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),

    /// Accounting configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] lwsim_accounting::ConfigError),

    /// Invalid scenario description.
    #[error("Invalid scenario: {0}")]
    Scenario(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Event Loop
// ============================================================================

/// Statistics from a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunStats {
    /// Number of events processed.
    pub events_processed: u64,
    /// Simulated time of the last processed event.
    pub end_time: SimTime,
}

/// Discrete-event loop with accounting taps.
pub struct EventLoop {
    heap: BinaryHeap<Event>,
    cancelled: HashSet<EventId>,
    ctx: SimContext,
    registry: EntityRegistry,
    horizon: SimTime,
    tracker: ComplianceTracker,
    scheduler: EpochScheduler,
    reports: Vec<ComplianceReport>,
    events_processed: u64,
}

impl EventLoop {
    /// Create a loop and arm the epoch timer.
    pub fn new(
        seed: u64,
        horizon: SimTime,
        tracker: ComplianceTracker,
        mut scheduler: EpochScheduler,
    ) -> Self {
        let mut ctx = SimContext::new(seed);
        scheduler.start(&mut ctx);
        let mut event_loop = EventLoop {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            ctx,
            registry: EntityRegistry::new(),
            horizon,
            tracker,
            scheduler,
            reports: Vec::new(),
            events_processed: 0,
        };
        event_loop.drain_context();
        event_loop
    }

    /// Register an entity.
    pub fn register(&mut self, entity: Box<dyn Entity>) {
        self.registry.register(entity);
    }

    /// Post an event from outside any entity (initial wiring).
    pub fn post(
        &mut self,
        delay: SimTime,
        targets: Vec<lwsim_common::EntityId>,
        payload: EventPayload,
    ) -> EventId {
        let id = self.ctx.post_event(delay, targets, payload);
        self.drain_context();
        id
    }

    /// RNG used for scenario wiring decisions (start jitter, link sampling).
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        self.ctx.rng()
    }

    /// Read access to the accounting core.
    pub fn tracker(&self) -> &ComplianceTracker {
        &self.tracker
    }

    /// All compliance reports emitted so far, in epoch order.
    pub fn reports(&self) -> &[ComplianceReport] {
        &self.reports
    }

    /// Run until the heap drains or the horizon is passed.
    pub fn run(&mut self) -> Result<RunStats, RunnerError> {
        while let Some(event) = self.heap.pop() {
            if self.cancelled.remove(&event.id) {
                continue;
            }
            if event.time > self.horizon {
                debug!(
                    time_secs = event.time.as_secs_f64(),
                    "next event is past the horizon, stopping"
                );
                break;
            }

            self.ctx.set_time(event.time);
            self.events_processed += 1;

            if self.observe(&event) {
                break;
            }
            self.registry.dispatch_event(&event, &mut self.ctx)?;
            self.drain_context();
        }

        Ok(RunStats {
            events_processed: self.events_processed,
            end_time: self.ctx.time(),
        })
    }

    /// Feed an event into the accounting core. Returns true when the event
    /// ends the run.
    fn observe(&mut self, event: &Event) -> bool {
        match &event.payload {
            EventPayload::DeviceTxStart(e) => {
                self.tracker.on_device_transmission(e.device, &e.meta);
            }
            EventPayload::GatewayTxStart(e) => {
                self.tracker.on_gateway_transmission(e.gateway, &e.meta);
            }
            EventPayload::GatewayRx(e) => {
                self.tracker.on_reception(&e.meta);
            }
            EventPayload::Timer { .. } if self.scheduler.matches(&event.payload) => {
                self.reports.extend(self.tracker.close_epochs());
                self.scheduler.on_tick(&mut self.ctx);
                self.drain_context();
            }
            EventPayload::Timer { .. } => {}
            EventPayload::SimulationEnd => {
                self.scheduler.cancel(&mut self.ctx);
                self.drain_context();
                return true;
            }
        }
        false
    }

    /// Move freshly posted events and cancellations out of the context.
    fn drain_context(&mut self) {
        for event in self.ctx.take_pending_events() {
            self.heap.push(event);
        }
        for id in self.ctx.take_cancellations() {
            self.cancelled.insert(id);
        }
    }
}
