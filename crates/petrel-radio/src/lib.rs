pub mod doctor;
pub mod link;
pub mod listener;
pub mod protocol;
pub mod radio;
pub mod rail;

#[cfg(test)]
pub(crate) mod testlink;

use serde::Deserialize;

/// Modem link settings, `[radio]` in the flight config.
#[derive(Debug, Clone, Deserialize)]
pub struct RadioConfig {
    /// Serial device of the modem.
    pub serial_dev: String,
    pub baud: u32,

    /// Per-byte read timeout, milliseconds. Default 1000.
    pub read_timeout_ms: Option<u64>,
    /// Deadline for one complete response, milliseconds. Default 10000.
    pub response_timeout_ms: Option<u64>,
    /// Settle delay after each sent command, milliseconds. Default 1000.
    pub settle_ms: Option<u64>,
    /// Delay between signal-quality polls, milliseconds. Default 1000.
    pub signal_poll_ms: Option<u64>,
    /// Delay between registration polls, milliseconds. Default 0.
    pub registration_poll_ms: Option<u64>,
    /// Registration polls during the first-open readiness check. Default 5.
    pub startup_checks: Option<u32>,
    /// Listener sleep when the modem has nothing buffered, milliseconds.
    /// Default 500.
    pub idle_poll_ms: Option<u64>,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            serial_dev: "/dev/ttyACM1".to_string(),
            baud: 19_200,
            read_timeout_ms: None,
            response_timeout_ms: None,
            settle_ms: None,
            signal_poll_ms: None,
            registration_poll_ms: None,
            startup_checks: None,
            idle_poll_ms: None,
        }
    }
}
