//! End-of-run summary report.
//!
//! Collects the accounting counters and the per-epoch compliance verdicts
//! into one serializable structure, rendered as text on stdout and optionally
//! written as JSON for downstream tooling.

use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use lwsim_accounting::{AccountingSummary, ComplianceReport};
use serde::Serialize;

use crate::{EventLoop, RunStats, RunnerError};

/// Final report for one simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    /// Wall-clock time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Simulated duration in seconds.
    pub duration_secs: f64,
    /// Events processed by the loop.
    pub events_processed: u64,
    /// Number of epochs that closed above their ceiling.
    pub violations: u64,
    /// Final accounting counters.
    pub accounting: AccountingSummary,
    /// Every compliance verdict, in epoch order.
    pub epochs: Vec<ComplianceReport>,
}

impl SummaryReport {
    /// Assemble the report from a finished run.
    pub fn from_run(event_loop: &EventLoop, stats: &RunStats) -> Self {
        let epochs = event_loop.reports().to_vec();
        let violations = epochs.iter().filter(|r| !r.compliant).count() as u64;
        SummaryReport {
            generated_at: Utc::now(),
            duration_secs: stats.end_time.as_secs_f64(),
            events_processed: stats.events_processed,
            violations,
            accounting: event_loop.tracker().summary(),
            epochs,
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), RunnerError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Render the report as the human-readable run summary.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Simulation summary: {:.1} s simulated, {} events",
            self.duration_secs, self.events_processed
        );

        let _ = writeln!(out, "\nPackets sent vs received per spreading factor:");
        for (index, (sent, received)) in self
            .accounting
            .sent_per_sf
            .iter()
            .zip(self.accounting.received_per_sf.iter())
            .enumerate()
        {
            let _ = writeln!(
                out,
                "  SF{}: sent = {}, received = {}",
                7 + index,
                sent,
                received
            );
        }

        let _ = writeln!(out, "\nUnique receptions per end device:");
        for (index, received) in self.accounting.received_per_node.iter().enumerate() {
            let marker = if self.accounting.furthest_device == Some(index) {
                " (furthest)"
            } else {
                ""
            };
            let _ = writeln!(out, "  ed{}{}: {}", index, marker, received);
        }
        let _ = writeln!(
            out,
            "Total unique packets received: {}",
            self.accounting.unique_received
        );

        let _ = writeln!(out, "\nAcknowledgments per gateway:");
        for (index, acks) in self.accounting.acks_per_gateway.iter().enumerate() {
            let _ = writeln!(out, "  gw{}: {}", index, acks);
        }

        let _ = writeln!(out, "\nDuty cycle per band:");
        for (band, history) in [
            ("rx1", &self.accounting.rx1_epochs),
            ("rx2", &self.accounting.rx2_epochs),
            ("device", &self.accounting.device_epochs),
        ] {
            let peak = history.iter().copied().fold(0.0_f64, f64::max);
            let band_violations = self
                .epochs
                .iter()
                .filter(|r| r.entity == band && !r.compliant)
                .count();
            let _ = writeln!(
                out,
                "  {}: {} epochs, peak {:.3} s, violations {}",
                band,
                history.len(),
                peak,
                band_violations
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> SummaryReport {
        let accounting = AccountingSummary {
            sent_per_sf: [15, 0, 0, 0, 0, 0],
            received_per_sf: [10, 0, 0, 0, 0, 0],
            received_per_node: vec![5, 5, 0],
            acks_per_gateway: vec![10],
            unique_received: 10,
            furthest_device: Some(2),
            rx1_epochs: vec![0.4, 0.6],
            rx2_epochs: vec![0.0, 0.0],
            device_epochs: vec![0.3, 37.0],
        };
        let epochs = vec![
            ComplianceReport {
                entity: "device".to_string(),
                epoch_index: 2,
                measured_airtime_secs: 37.0,
                ceiling_secs: 36.0,
                compliant: false,
            },
        ];
        SummaryReport {
            generated_at: Utc::now(),
            duration_secs: 7200.0,
            events_processed: 42,
            violations: 1,
            accounting,
            epochs,
        }
    }

    #[test]
    fn test_render_text_contains_counters() {
        let text = sample_report().render_text();
        assert!(text.contains("SF7: sent = 15, received = 10"));
        assert!(text.contains("ed2 (furthest): 0"));
        assert!(text.contains("Total unique packets received: 10"));
        assert!(text.contains("gw0: 10"));
        assert!(text.contains("device: 2 epochs, peak 37.000 s, violations 1"));
    }

    #[test]
    fn test_json_roundtrip() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"unique_received\":10"));
        assert!(json.contains("\"compliant\":false"));
    }
}
