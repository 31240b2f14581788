use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use petrel_state::mode::{PowerMode, PowerModeCell};

use crate::eps::BusVoltageSource;

pub const DEFAULT_THRESHOLD_VOLTS: f64 = 4.0;

/// Mode-transition handlers. Implementors reconfigure the spacecraft
/// (radio power, listener threads, beacon cadence) and store the new
/// mode; nothing else may write the mode cell.
///
/// `enter_emergency` is never invoked by the watchdog itself. It exists
/// for explicit triggers wired elsewhere.
pub trait ModeTransitions: Send {
    fn enter_normal(&mut self, reason: &str);
    fn enter_low_power(&mut self, reason: &str);
    fn enter_emergency(&mut self, reason: &str);
}

/// Battery threshold loop.
///
/// Each poll reads the bus voltage once and compares it against the
/// threshold: at or above means the spacecraft belongs in normal mode,
/// below means low power. A handler fires only when the current mode
/// disagrees, so holding steady on one side of the threshold is silent.
/// The loop keeps no memory between polls; it leans entirely on the
/// mode cell the handlers write.
pub struct PowerWatchdog {
    source: Box<dyn BusVoltageSource>,
    mode: Arc<PowerModeCell>,
    transitions: Box<dyn ModeTransitions>,
    threshold: f64,
    poll_period: Duration,
}

impl PowerWatchdog {
    pub fn new(
        source: Box<dyn BusVoltageSource>,
        mode: Arc<PowerModeCell>,
        transitions: Box<dyn ModeTransitions>,
        threshold: f64,
        poll_period: Duration,
    ) -> Self {
        Self { source, mode, transitions, threshold, poll_period }
    }

    pub fn poll_once(&mut self) -> Result<()> {
        let volts = self.source.read_volts().context("battery watchdog")?;
        let mode = self.mode.load();
        if volts >= self.threshold && mode != PowerMode::Normal {
            self.transitions
                .enter_normal(&format!("Battery level at sufficient state: {volts}"));
        } else if volts < self.threshold && mode != PowerMode::LowPower {
            self.transitions
                .enter_low_power(&format!("Battery level at critical state: {volts}"));
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            self.poll_once()?;
            thread::sleep(self.poll_period);
        }
    }
}
