use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;

use crate::registry::{StateField, StateRegistry, BOOT_TIME_UNSET};

/// Publishes system time into the registry.
///
/// The first tick after power-up also latches [`StateField::BootTime`],
/// which holds the unset sentinel until then.
pub struct ClockTask {
    registry: Arc<StateRegistry>,
    period: Duration,
}

impl ClockTask {
    pub fn new(registry: Arc<StateRegistry>) -> Self {
        Self { registry, period: Duration::from_secs(1) }
    }

    /// One clock update.
    pub fn tick(&self) {
        let now = OffsetDateTime::now_utc().unix_timestamp() as f64;
        self.registry.update(StateField::Time, now);
        let boot = self.registry.get(StateField::BootTime).unwrap_or(BOOT_TIME_UNSET);
        if boot < 0.0 {
            self.registry.update(StateField::BootTime, now);
        }
    }

    /// Tick forever at the clock period. Meant to run under a supervisor.
    pub fn run(&self) -> Result<()> {
        loop {
            self.tick();
            thread::sleep(self.period);
        }
    }
}
