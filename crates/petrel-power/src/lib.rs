pub mod doctor;
pub mod eps;
pub mod watchdog;

use serde::Deserialize;

/// Battery monitoring settings, `[power]` in the flight config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerConfig {
    /// Sysfs node carrying the battery bus voltage in microvolts.
    pub voltage_path: Option<String>,
    /// Boundary between low-power and normal operation, volts.
    /// Default 4.0.
    pub threshold_volts: Option<f64>,
    /// Watchdog poll period, milliseconds. Default 1000.
    pub poll_ms: Option<u64>,
    /// Telemetry sampler period, milliseconds. Default 1000.
    pub sample_ms: Option<u64>,
}
