use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Spacecraft operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    Normal,
    LowPower,
    Emergency,
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerMode::Normal => "normal",
            PowerMode::LowPower => "low-power",
            PowerMode::Emergency => "emergency",
        })
    }
}

/// Lock-free cell holding the current [`PowerMode`].
///
/// Any unit may read at any time; only mode-transition handlers write.
pub struct PowerModeCell(AtomicU8);

impl PowerModeCell {
    pub fn new(mode: PowerMode) -> Self {
        Self(AtomicU8::new(mode as u8))
    }

    pub fn load(&self) -> PowerMode {
        match self.0.load(Ordering::Acquire) {
            0 => PowerMode::Normal,
            1 => PowerMode::LowPower,
            _ => PowerMode::Emergency,
        }
    }

    pub fn store(&self, mode: PowerMode) {
        self.0.store(mode as u8, Ordering::Release);
    }
}
