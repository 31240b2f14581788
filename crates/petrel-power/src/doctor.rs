use anyhow::Result;

use crate::PowerConfig;
use crate::watchdog::DEFAULT_THRESHOLD_VOLTS;

pub fn check_power_config(cfg: &PowerConfig) -> Result<()> {
    let threshold = cfg.threshold_volts.unwrap_or(DEFAULT_THRESHOLD_VOLTS);
    anyhow::ensure!(
        (2.5..=8.4).contains(&threshold),
        "power.threshold_volts out of range for a li-ion bus: {}",
        threshold
    );
    anyhow::ensure!(cfg.poll_ms.unwrap_or(1_000) >= 10, "power.poll_ms too tight; set >= 10ms");
    if let Some(path) = &cfg.voltage_path {
        anyhow::ensure!(!path.is_empty(), "power.voltage_path is empty");
    }
    Ok(())
}
