pub mod aprs;
pub mod doctor;

use serde::Deserialize;

/// APRS radio and GPS board settings, `[gps]` in the flight config.
#[derive(Debug, Clone, Deserialize)]
pub struct GpsConfig {
    /// Serial device of the APRS radio carrying the GPS board.
    pub serial_dev: String,
    pub baud: u32,

    /// Per-read timeout, milliseconds. Default 1000.
    pub read_timeout_ms: Option<u64>,
    /// Pause between the two passes of a burst drain, milliseconds.
    /// Default 500.
    pub settle_ms: Option<u64>,
    /// Listener sleep when nothing is buffered, milliseconds. Default 500.
    pub idle_poll_ms: Option<u64>,
    /// Run the ground-test console prompt. Default off.
    pub console: Option<bool>,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            serial_dev: "/dev/ttyUSB0".to_string(),
            baud: 19_200,
            read_timeout_ms: None,
            settle_ms: None,
            idle_poll_ms: None,
            console: None,
        }
    }
}
