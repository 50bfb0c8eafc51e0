//! Accounting configuration and startup validation.
//!
//! A bad ceiling or epoch length makes every compliance verdict meaningless,
//! so these are the only inputs the engine refuses to run with. Everything
//! else (malformed packets, odd spreading factors) is handled per event.

use lwsim_common::SimTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ETSI EU868 g1/g2 sub-band ceiling: 1% of one hour.
pub const EU868_RX1_CEILING_SECS: f64 = 36.0;

/// ETSI EU868 g3 sub-band ceiling (RX2 channel): 10% of one hour.
pub const EU868_RX2_CEILING_SECS: f64 = 360.0;

/// ETSI EU868 end-device ceiling: 1% of one hour.
pub const EU868_DEVICE_CEILING_SECS: f64 = 36.0;

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Epoch length must be positive.
    #[error("epoch length must be positive")]
    NonPositiveEpoch,

    /// Simulation horizon must be positive.
    #[error("simulation horizon must be positive")]
    NonPositiveHorizon,

    /// A duty-cycle ceiling must be positive and finite.
    #[error("duty-cycle ceiling for {band} must be positive and finite, got {value}")]
    InvalidCeiling {
        /// Which sub-band the ceiling belongs to.
        band: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// Configuration for the compliance tracker, consumed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingConfig {
    /// Length of one accounting epoch.
    pub epoch_length: SimTime,
    /// Simulated time at which the epoch scheduler stops rescheduling.
    pub horizon: SimTime,
    /// Regulatory ceiling per epoch for gateway RX1 downlinks, in seconds.
    pub rx1_ceiling_secs: f64,
    /// Regulatory ceiling per epoch for gateway RX2 downlinks, in seconds.
    pub rx2_ceiling_secs: f64,
    /// Regulatory ceiling per epoch for the tracked end device, in seconds.
    pub device_ceiling_secs: f64,
    /// Frequency of the designated RX2 downlink channel, in Hz.
    pub rx2_frequency_hz: u32,
    /// Number of end devices in the network.
    pub device_count: usize,
    /// Number of gateways in the network.
    pub gateway_count: usize,
}

impl AccountingConfig {
    /// EU868 defaults: one-hour epochs, ETSI ceilings, 869.525 MHz RX2.
    pub fn eu868(device_count: usize, gateway_count: usize, horizon: SimTime) -> Self {
        AccountingConfig {
            epoch_length: SimTime::from_hours(1),
            horizon,
            rx1_ceiling_secs: EU868_RX1_CEILING_SECS,
            rx2_ceiling_secs: EU868_RX2_CEILING_SECS,
            device_ceiling_secs: EU868_DEVICE_CEILING_SECS,
            rx2_frequency_hz: lwsim_phy::EU868_RX2_FREQUENCY_HZ,
            device_count,
            gateway_count,
        }
    }

    /// Validate the configuration. Called by
    /// [`ComplianceTracker::new`](crate::ComplianceTracker::new).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epoch_length == SimTime::ZERO {
            return Err(ConfigError::NonPositiveEpoch);
        }
        if self.horizon == SimTime::ZERO {
            return Err(ConfigError::NonPositiveHorizon);
        }
        for (band, value) in [
            ("rx1", self.rx1_ceiling_secs),
            ("rx2", self.rx2_ceiling_secs),
            ("device", self.device_ceiling_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidCeiling { band, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eu868_defaults_are_valid() {
        let config = AccountingConfig::eu868(20, 1, SimTime::from_hours(24));
        assert!(config.validate().is_ok());
        assert_eq!(config.rx1_ceiling_secs, 36.0);
        assert_eq!(config.rx2_ceiling_secs, 360.0);
        assert_eq!(config.rx2_frequency_hz, 869_525_000);
    }

    #[test]
    fn test_zero_epoch_rejected() {
        let mut config = AccountingConfig::eu868(1, 1, SimTime::from_hours(1));
        config.epoch_length = SimTime::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositiveEpoch)));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let mut config = AccountingConfig::eu868(1, 1, SimTime::from_hours(1));
        config.horizon = SimTime::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositiveHorizon)));
    }

    #[test]
    fn test_bad_ceilings_rejected() {
        let mut config = AccountingConfig::eu868(1, 1, SimTime::from_hours(1));
        config.rx2_ceiling_secs = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCeiling { band: "rx2", .. })
        ));

        let mut config = AccountingConfig::eu868(1, 1, SimTime::from_hours(1));
        config.device_ceiling_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AccountingConfig::eu868(1, 1, SimTime::from_hours(1));
        config.rx1_ceiling_secs = -36.0;
        assert!(config.validate().is_err());
    }
}
