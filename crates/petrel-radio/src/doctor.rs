use anyhow::Result;

use crate::RadioConfig;

pub fn check_link_config(cfg: &RadioConfig) -> Result<()> {
    anyhow::ensure!(!cfg.serial_dev.is_empty(), "radio.serial_dev is empty");
    anyhow::ensure!(
        cfg.serial_dev.starts_with("/dev/"),
        "radio.serial_dev should name a tty under /dev: {}",
        cfg.serial_dev
    );
    anyhow::ensure!(cfg.baud >= 1_200 && cfg.baud <= 115_200, "radio.baud out of range");
    let read = cfg.read_timeout_ms.unwrap_or(1_000);
    let response = cfg.response_timeout_ms.unwrap_or(10_000);
    anyhow::ensure!(read >= 1, "radio.read_timeout_ms must be nonzero");
    anyhow::ensure!(
        response >= read,
        "radio.response_timeout_ms shorter than one read timeout"
    );
    anyhow::ensure!(cfg.startup_checks.unwrap_or(5) >= 1, "radio.startup_checks must be >= 1");
    Ok(())
}
