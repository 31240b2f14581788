use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use petrel_state::registry::{StateField, StateRegistry};

pub const DEFAULT_VOLTAGE_PATH: &str = "/sys/class/power_supply/battery/voltage_now";

/// Battery bus voltage, read fresh on every call.
pub trait BusVoltageSource: Send {
    fn read_volts(&mut self) -> Result<f64>;
}

/// Reads the EPS battery bus through a sysfs node holding microvolts.
pub struct SysfsVoltage {
    path: PathBuf,
}

impl SysfsVoltage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BusVoltageSource for SysfsVoltage {
    fn read_volts(&mut self) -> Result<f64> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read battery voltage node {}", self.path.display()))?;
        let microvolts: i64 = raw
            .trim()
            .parse()
            .with_context(|| format!("bad voltage reading {raw:?}"))?;
        Ok(microvolts as f64 / 1_000_000.0)
    }
}

/// Publishes the battery bus voltage into the state registry so other
/// units (telemetry, the position beacon) can read it without touching
/// the EPS themselves.
pub struct EpsSampler {
    source: Box<dyn BusVoltageSource>,
    registry: Arc<StateRegistry>,
    period: Duration,
}

impl EpsSampler {
    pub fn new(
        source: Box<dyn BusVoltageSource>,
        registry: Arc<StateRegistry>,
        period: Duration,
    ) -> Self {
        Self { source, registry, period }
    }

    pub fn sample_once(&mut self) -> Result<()> {
        let volts = self.source.read_volts()?;
        self.registry.update(StateField::BatteryBusVolts, volts);
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            self.sample_once()?;
            thread::sleep(self.period);
        }
    }
}
