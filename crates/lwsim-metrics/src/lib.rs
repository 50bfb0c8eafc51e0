//! Metrics infrastructure for the lwsim compliance simulator.
//!
//! This crate re-exports the `metrics` facade and declares every metric the
//! simulator emits as a structured [`Metric`] constant, so call sites never
//! spell metric names by hand and descriptions can be registered in one place.
//!
//! # Example
//!
//! ```rust,ignore
//! use lwsim_metrics::{describe_metrics, metric_defs};
//!
//! // Register metric descriptions at startup.
//! describe_metrics();
//!
//! // Emit with the metrics crate macros.
//! let labels = [("sf", "7".to_string())];
//! metrics::counter!(metric_defs::PHY_TX_PACKETS.name, &labels).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// Use the const constructors to declare metrics at compile time:
///
/// ```rust
/// use lwsim_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const ACKS: Metric = Metric::counter("lwsim.gateway.acks")
///     .with_description("Downlink acknowledgments transmitted")
///     .with_unit(Unit::Count)
///     .with_labels(&["gateway"]);
///
/// assert_eq!(ACKS.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "lwsim.phy.tx_packets").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the compliance simulator.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // PHY Layer Metrics
    // ========================================================================

    /// Uplink frames transmitted, broken down by spreading factor.
    pub const PHY_TX_PACKETS: Metric = Metric::counter("lwsim.phy.tx_packets")
        .with_description("Uplink frames transmitted")
        .with_unit(Unit::Count)
        .with_labels(&["sf"]);

    /// Unique uplink frames received at a gateway, broken down by spreading
    /// factor. Duplicate receptions of the same packet id are excluded.
    pub const PHY_RX_PACKETS: Metric = Metric::counter("lwsim.phy.rx_packets")
        .with_description("Unique uplink frames received")
        .with_unit(Unit::Count)
        .with_labels(&["sf"]);

    /// Total unique packet ids received across all gateways.
    pub const PHY_RX_UNIQUE: Metric = Metric::counter("lwsim.phy.rx_unique")
        .with_description("Unique packet ids received")
        .with_unit(Unit::Count);

    /// Receptions discarded because the packet id was already counted
    /// (e.g., a second gateway hearing the same uplink).
    pub const PHY_RX_DUPLICATE: Metric = Metric::counter("lwsim.phy.rx_duplicate")
        .with_description("Duplicate receptions suppressed")
        .with_unit(Unit::Count);

    // ========================================================================
    // Attribution Metrics
    // ========================================================================

    /// Unique receptions attributed to the originating end device.
    pub const NODE_RX_DELIVERED: Metric = Metric::counter("lwsim.node.rx_delivered")
        .with_description("Unique receptions attributed per end device")
        .with_unit(Unit::Count)
        .with_labels(&["node"]);

    /// Downlink acknowledgments transmitted per gateway.
    pub const GATEWAY_ACKS: Metric = Metric::counter("lwsim.gateway.acks")
        .with_description("Downlink acknowledgments transmitted")
        .with_unit(Unit::Count)
        .with_labels(&["gateway"]);

    // ========================================================================
    // Duty Cycle Metrics
    // ========================================================================

    /// Accumulated time on air in microseconds per monitored sub-band.
    pub const DUTY_AIRTIME: Metric = Metric::counter("lwsim.duty.airtime_us")
        .with_description("Accumulated time on air")
        .with_unit(Unit::Microseconds)
        .with_labels(&["band"]);

    /// Measured airtime per closed epoch, in seconds.
    pub const DUTY_EPOCH_AIRTIME: Metric = Metric::histogram("lwsim.duty.epoch_airtime_s")
        .with_description("Airtime measured per closed epoch")
        .with_unit(Unit::Seconds)
        .with_labels(&["band"]);

    /// Epochs that closed above the configured regulatory ceiling.
    pub const DUTY_VIOLATIONS: Metric = Metric::counter("lwsim.duty.violations")
        .with_description("Epochs closed above the regulatory ceiling")
        .with_unit(Unit::Count)
        .with_labels(&["band"]);

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &PHY_TX_PACKETS,
        &PHY_RX_PACKETS,
        &PHY_RX_UNIQUE,
        &PHY_RX_DUPLICATE,
        &NODE_RX_DELIVERED,
        &GATEWAY_ACKS,
        &DUTY_AIRTIME,
        &DUTY_EPOCH_AIRTIME,
        &DUTY_VIOLATIONS,
    ];
}

/// Describes all metrics used in the simulator.
///
/// Call once at startup, after installing a recorder, so exporters can show
/// metric descriptions and units.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_builders() {
        const TEST_COUNTER: Metric = Metric::counter("test.counter")
            .with_description("A test counter")
            .with_unit(Unit::Count)
            .with_labels(&["band"]);

        assert_eq!(TEST_COUNTER.name, "test.counter");
        assert_eq!(TEST_COUNTER.kind, MetricKind::Counter);
        assert_eq!(TEST_COUNTER.description, "A test counter");
        assert_eq!(TEST_COUNTER.unit, Some(Unit::Count));
        assert_eq!(TEST_COUNTER.labels, &["band"]);
    }

    #[test]
    fn test_metric_minimal() {
        const MINIMAL: Metric = Metric::gauge("minimal");
        assert_eq!(MINIMAL.kind, MetricKind::Gauge);
        assert_eq!(MINIMAL.description, "");
        assert_eq!(MINIMAL.unit, None);
        assert!(MINIMAL.labels.is_empty());
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::PHY_TX_PACKETS.name, "lwsim.phy.tx_packets");
        assert_eq!(metric_defs::PHY_TX_PACKETS.kind, MetricKind::Counter);
        assert_eq!(metric_defs::DUTY_AIRTIME.unit, Some(Unit::Microseconds));
        assert_eq!(metric_defs::DUTY_EPOCH_AIRTIME.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::ALL.len(), 9);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(MetricKind::Counter.as_str(), "counter");
        assert_eq!(MetricKind::Histogram.to_string(), "histogram");
    }
}
