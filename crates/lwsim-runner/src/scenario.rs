//! YAML scenario descriptions.
//!
//! A scenario describes the network layout and traffic pattern: device and
//! gateway positions, spreading factors, the uplink cadence and the
//! accounting parameters. The built-in default reproduces the 20-device
//! bridge-monitoring deployment with a single distant gateway.

use std::path::Path;

use lwsim_accounting::AccountingConfig;
use lwsim_common::{Position, SimTime};
use serde::{Deserialize, Serialize};

use crate::RunnerError;

fn default_duration_hours() -> u64 {
    24
}

fn default_seed() -> u64 {
    1
}

fn default_uplink_period_secs() -> f64 {
    900.0
}

fn default_payload_size() -> usize {
    24
}

fn default_true() -> bool {
    true
}

fn default_epoch_secs() -> f64 {
    3600.0
}

fn default_uplink_frequency_hz() -> u32 {
    868_100_000
}

fn default_rx2_frequency_hz() -> u32 {
    lwsim_phy::EU868_RX2_FREQUENCY_HZ
}

fn default_spreading_factor() -> u8 {
    7
}

fn default_delivery_probability() -> f64 {
    1.0
}

/// One end device in the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// X coordinate in meters.
    pub x: f64,
    /// Y coordinate in meters.
    pub y: f64,
    /// Z coordinate (height) in meters.
    #[serde(default)]
    pub z: f64,
    /// Spreading factor the device uplinks with (7-12).
    #[serde(default = "default_spreading_factor")]
    pub spreading_factor: u8,
    /// Probability that any single uplink is heard by a gateway.
    #[serde(default = "default_delivery_probability")]
    pub delivery_probability: f64,
}

impl DeviceSpec {
    /// The device position.
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }
}

/// One gateway in the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySpec {
    /// X coordinate in meters.
    pub x: f64,
    /// Y coordinate in meters.
    pub y: f64,
    /// Z coordinate (height) in meters.
    #[serde(default)]
    pub z: f64,
}

impl GatewaySpec {
    /// The gateway position.
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }
}

/// A temporary uplink-cadence change in the middle of the run, e.g. more
/// frequent polling during a structural inspection window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingBoost {
    /// When the boosted cadence starts, seconds from simulation start.
    pub start_secs: f64,
    /// When the normal cadence resumes, seconds from simulation start.
    pub end_secs: f64,
    /// Uplink period during the boost window, in seconds.
    pub period_secs: f64,
}

/// A complete simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Total simulated time in hours.
    #[serde(default = "default_duration_hours")]
    pub duration_hours: u64,
    /// RNG seed for start jitter and delivery sampling.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Uplink period per device, in seconds.
    #[serde(default = "default_uplink_period_secs")]
    pub uplink_period_secs: f64,
    /// Application payload size in bytes.
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,
    /// Whether devices send confirmed uplinks (gateways then answer with
    /// acknowledgment downlinks).
    #[serde(default = "default_true")]
    pub confirmed_uplinks: bool,
    /// Accounting epoch length, in seconds.
    #[serde(default = "default_epoch_secs")]
    pub epoch_secs: f64,
    /// Uplink channel frequency in Hz.
    #[serde(default = "default_uplink_frequency_hz")]
    pub uplink_frequency_hz: u32,
    /// RX2 downlink channel frequency in Hz.
    #[serde(default = "default_rx2_frequency_hz")]
    pub rx2_frequency_hz: u32,
    /// Optional mid-run polling boost window.
    #[serde(default)]
    pub polling_boost: Option<PollingBoost>,
    /// End devices.
    pub devices: Vec<DeviceSpec>,
    /// Gateways.
    pub gateways: Vec<GatewaySpec>,
}

impl Scenario {
    /// The built-in bridge deployment: 20 devices in a line at 5 m spacing
    /// and one gateway 800 m away.
    pub fn bridge() -> Self {
        let devices = (0..20)
            .map(|i| DeviceSpec {
                x: f64::from(i) * 5.0 + 5.0,
                y: if i % 2 == 0 { 0.0 } else { 1.0 },
                z: 1.5,
                spreading_factor: default_spreading_factor(),
                delivery_probability: default_delivery_probability(),
            })
            .collect();
        Scenario {
            duration_hours: default_duration_hours(),
            seed: default_seed(),
            uplink_period_secs: default_uplink_period_secs(),
            payload_size: default_payload_size(),
            confirmed_uplinks: true,
            epoch_secs: default_epoch_secs(),
            uplink_frequency_hz: default_uplink_frequency_hz(),
            rx2_frequency_hz: default_rx2_frequency_hz(),
            polling_boost: None,
            devices,
            gateways: vec![GatewaySpec {
                x: -800.0,
                y: 100.0,
                z: 10.0,
            }],
        }
    }

    /// Load a scenario from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, RunnerError> {
        let text = std::fs::read_to_string(path)?;
        let scenario: Scenario = serde_yaml::from_str(&text)?;
        Ok(scenario)
    }

    /// Check the parts of the scenario the builder relies on.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.devices.is_empty() {
            return Err(RunnerError::Scenario("at least one device required".into()));
        }
        if self.gateways.is_empty() {
            return Err(RunnerError::Scenario("at least one gateway required".into()));
        }
        if !(self.uplink_period_secs.is_finite() && self.uplink_period_secs > 0.0) {
            return Err(RunnerError::Scenario(format!(
                "uplink period must be positive, got {}",
                self.uplink_period_secs
            )));
        }
        if let Some(boost) = &self.polling_boost {
            if boost.end_secs <= boost.start_secs {
                return Err(RunnerError::Scenario(
                    "polling boost window must end after it starts".into(),
                ));
            }
            if !(boost.period_secs.is_finite() && boost.period_secs > 0.0) {
                return Err(RunnerError::Scenario(format!(
                    "polling boost period must be positive, got {}",
                    boost.period_secs
                )));
            }
        }
        for (index, device) in self.devices.iter().enumerate() {
            if !(0.0..=1.0).contains(&device.delivery_probability) {
                return Err(RunnerError::Scenario(format!(
                    "device {} delivery probability {} outside [0, 1]",
                    index, device.delivery_probability
                )));
            }
        }
        Ok(())
    }

    /// The simulation horizon.
    pub fn horizon(&self) -> SimTime {
        SimTime::from_hours(self.duration_hours)
    }

    /// Accounting configuration derived from this scenario. Ceilings are the
    /// ETSI EU868 defaults; epoch length and RX2 frequency come from the
    /// scenario.
    pub fn accounting_config(&self) -> AccountingConfig {
        let mut config =
            AccountingConfig::eu868(self.devices.len(), self.gateways.len(), self.horizon());
        config.epoch_length = SimTime::from_secs(self.epoch_secs);
        config.rx2_frequency_hz = self.rx2_frequency_hz;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_scenario_is_valid() {
        let scenario = Scenario::bridge();
        assert!(scenario.validate().is_ok());
        assert_eq!(scenario.devices.len(), 20);
        assert_eq!(scenario.gateways.len(), 1);
        assert!(scenario.accounting_config().validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_with_defaults() {
        let yaml = r#"
devices:
  - { x: 5.0, y: 0.0, z: 1.5 }
  - { x: 10.0, y: 1.0, z: 1.5, spreading_factor: 9, delivery_probability: 0.8 }
gateways:
  - { x: -800.0, y: 100.0, z: 10.0 }
duration_hours: 2
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert!(scenario.validate().is_ok());
        assert_eq!(scenario.duration_hours, 2);
        assert_eq!(scenario.devices[0].spreading_factor, 7);
        assert_eq!(scenario.devices[1].spreading_factor, 9);
        assert!((scenario.devices[1].delivery_probability - 0.8).abs() < 1e-12);
        assert_eq!(scenario.rx2_frequency_hz, 869_525_000);
    }

    #[test]
    fn test_empty_layout_rejected() {
        let mut scenario = Scenario::bridge();
        scenario.devices.clear();
        assert!(scenario.validate().is_err());

        let mut scenario = Scenario::bridge();
        scenario.gateways.clear();
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_bad_boost_window_rejected() {
        let mut scenario = Scenario::bridge();
        scenario.polling_boost = Some(PollingBoost {
            start_secs: 7200.0,
            end_secs: 3600.0,
            period_secs: 90.0,
        });
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_bad_delivery_probability_rejected() {
        let mut scenario = Scenario::bridge();
        scenario.devices[0].delivery_probability = 1.5;
        assert!(scenario.validate().is_err());
    }
}
