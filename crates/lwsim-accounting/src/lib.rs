//! # lwsim-accounting
//!
//! Airtime accounting and duty-cycle compliance engine.
//!
//! This crate is the accounting core of the simulator. Driven by
//! transmission, reception and timer events delivered by the external event
//! substrate, it:
//! - attributes and deduplicates received packets ([`PacketLedger`])
//! - accumulates per-band time on air and judges regulatory compliance once
//!   per epoch ([`DutyCycleWindow`], [`EpochScheduler`])
//! - selects the worst-case end device whose airtime is tracked individually
//!   ([`furthest_device`])
//!
//! All state is owned by a single [`ComplianceTracker`] context object that
//! the host passes into every entry point; there are no ambient globals. Data
//! quality problems (bad spreading factors, unknown packet ids, non-finite
//! airtime) are logged and contained per event; only configuration problems
//! are fatal, and only at construction time.

pub mod config;
pub mod duty_cycle;
pub mod epoch;
pub mod ledger;
pub mod selector;
pub mod tracker;

pub use config::{AccountingConfig, ConfigError};
pub use duty_cycle::{ComplianceReport, DutyCycleWindow};
pub use epoch::EpochScheduler;
pub use ledger::{PacketIdIssuer, PacketLedger};
pub use selector::furthest_device;
pub use tracker::{AccountingSummary, ComplianceTracker};
