use anyhow::Result;

use crate::GpsConfig;

pub fn check_aprs_config(cfg: &GpsConfig) -> Result<()> {
    anyhow::ensure!(!cfg.serial_dev.is_empty(), "gps.serial_dev is empty");
    anyhow::ensure!(
        cfg.serial_dev.starts_with("/dev/"),
        "gps.serial_dev should name a tty under /dev: {}",
        cfg.serial_dev
    );
    anyhow::ensure!(cfg.baud >= 1_200 && cfg.baud <= 115_200, "gps.baud out of range");
    anyhow::ensure!(
        cfg.settle_ms.unwrap_or(500) <= 5_000,
        "gps.settle_ms too long; bursts would back up"
    );
    Ok(())
}
