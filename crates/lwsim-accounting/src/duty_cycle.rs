//! Per-band duty-cycle accumulation and epoch evaluation.
//!
//! Each monitored entity (gateway RX1 sub-band, gateway RX2 sub-band, the
//! tracked end device) owns one [`DutyCycleWindow`]. Transmissions add time
//! on air with no immediate compliance check; once per epoch the window is
//! closed, compared against its regulatory ceiling, recorded into history and
//! reset. Exactly one history entry is appended per boundary, whether or not
//! the window was touched.

use lwsim_metrics::metric_defs;
use serde::Serialize;
use tracing::{info, warn};

/// Result of closing one accounting epoch for one monitored entity.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    /// Label of the monitored entity (band).
    pub entity: String,
    /// 1-based index of the closed epoch.
    pub epoch_index: u64,
    /// Time on air accumulated during the epoch, in seconds.
    pub measured_airtime_secs: f64,
    /// Regulatory ceiling for one epoch, in seconds.
    pub ceiling_secs: f64,
    /// Whether the measured airtime was within the ceiling.
    pub compliant: bool,
}

/// Cumulative airtime window for one monitored entity.
pub struct DutyCycleWindow {
    entity: String,
    ceiling_secs: f64,
    cumulative_secs: f64,
    history: Vec<f64>,
}

impl DutyCycleWindow {
    /// Create a window with the given entity label and per-epoch ceiling in
    /// seconds. The ceiling must already have passed configuration
    /// validation.
    pub fn new(entity: impl Into<String>, ceiling_secs: f64) -> Self {
        debug_assert!(ceiling_secs.is_finite() && ceiling_secs > 0.0);
        DutyCycleWindow {
            entity: entity.into(),
            ceiling_secs,
            cumulative_secs: 0.0,
            history: Vec::new(),
        }
    }

    /// Add a transmission's time on air to the current epoch.
    ///
    /// No compliance check happens here; verdicts are rendered only at epoch
    /// boundaries. A non-finite or negative duration is discarded so one bad
    /// sample cannot poison the cumulative total.
    pub fn record(&mut self, airtime_secs: f64) {
        if !airtime_secs.is_finite() || airtime_secs < 0.0 {
            warn!(entity = %self.entity, airtime_secs, "discarding invalid airtime sample");
            return;
        }
        self.cumulative_secs += airtime_secs;
        let labels = [("band", self.entity.clone())];
        metrics::counter!(metric_defs::DUTY_AIRTIME.name, &labels)
            .increment((airtime_secs * 1e6) as u64);
    }

    /// Close the current epoch: append it to history, judge it against the
    /// ceiling and reset the accumulator.
    ///
    /// Must be invoked exactly once per epoch boundary, including epochs with
    /// no transmissions (which close with zero airtime, trivially compliant).
    pub fn close_epoch(&mut self) -> ComplianceReport {
        let measured = self.cumulative_secs;
        self.history.push(measured);
        self.cumulative_secs = 0.0;

        let compliant = measured <= self.ceiling_secs;
        let report = ComplianceReport {
            entity: self.entity.clone(),
            epoch_index: self.history.len() as u64,
            measured_airtime_secs: measured,
            ceiling_secs: self.ceiling_secs,
            compliant,
        };

        let labels = [("band", self.entity.clone())];
        metrics::histogram!(metric_defs::DUTY_EPOCH_AIRTIME.name, &labels).record(measured);
        if compliant {
            info!(
                entity = %self.entity,
                epoch = report.epoch_index,
                airtime_secs = measured,
                "duty cycle compliant"
            );
        } else {
            metrics::counter!(metric_defs::DUTY_VIOLATIONS.name, &labels).increment(1);
            info!(
                entity = %self.entity,
                epoch = report.epoch_index,
                airtime_secs = measured,
                ceiling_secs = self.ceiling_secs,
                "duty cycle exceeded"
            );
        }

        report
    }

    /// Entity label.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Airtime accumulated in the current (open) epoch, in seconds.
    pub fn cumulative_secs(&self) -> f64 {
        self.cumulative_secs
    }

    /// Measured airtime of every closed epoch, oldest first.
    pub fn history(&self) -> &[f64] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_epoch_closes_compliant() {
        let mut window = DutyCycleWindow::new("rx1", 36.0);
        let report = window.close_epoch();
        assert_eq!(report.epoch_index, 1);
        assert_eq!(report.measured_airtime_secs, 0.0);
        assert!(report.compliant);
        assert_eq!(window.history(), &[0.0]);
    }

    #[test]
    fn test_compliance_boundary() {
        let mut window = DutyCycleWindow::new("rx1", 36.0);
        window.record(36.0);
        assert!(window.close_epoch().compliant);

        window.record(36.001);
        assert!(!window.close_epoch().compliant);
    }

    #[test]
    fn test_close_resets_accumulator() {
        let mut window = DutyCycleWindow::new("device", 36.0);
        window.record(1.5);
        window.record(2.5);
        assert!((window.cumulative_secs() - 4.0).abs() < 1e-12);

        let report = window.close_epoch();
        assert!((report.measured_airtime_secs - 4.0).abs() < 1e-12);
        assert_eq!(window.cumulative_secs(), 0.0);

        // The next epoch starts from zero.
        window.record(0.5);
        let report = window.close_epoch();
        assert_eq!(report.epoch_index, 2);
        assert!((report.measured_airtime_secs - 0.5).abs() < 1e-12);
        assert_eq!(window.history().len(), 2);
    }

    #[test]
    fn test_one_history_entry_per_close() {
        let mut window = DutyCycleWindow::new("rx2", 360.0);
        for _ in 0..24 {
            window.close_epoch();
        }
        assert_eq!(window.history().len(), 24);
    }

    #[test]
    fn test_invalid_samples_are_discarded() {
        let mut window = DutyCycleWindow::new("rx1", 36.0);
        window.record(f64::NAN);
        window.record(f64::INFINITY);
        window.record(-1.0);
        window.record(2.0);
        assert!((window.cumulative_secs() - 2.0).abs() < 1e-12);
    }
}
