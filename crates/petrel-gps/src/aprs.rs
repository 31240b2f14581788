//! APRS radio plumbing: command framing, the burst listener, the
//! position beacon, and the ground-test console.

use std::io::{self, BufRead, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use tracing::info;

use petrel_state::mode::{PowerMode, PowerModeCell};
use petrel_state::registry::{StateField, StateRegistry};

use crate::GpsConfig;

/// Beacon cadence in normal mode, seconds.
pub const BEACON_NORMAL_SECS: u64 = 60;
/// Beacon cadence in low-power mode, seconds.
pub const BEACON_LOW_POWER_SECS: u64 = 120;

/// Wrap a command body in the board's framing: `TJ` prefix plus a
/// mod-128 checksum character over prefix and body together.
pub fn frame_command(body: &str) -> String {
    let mut framed = String::with_capacity(body.len() + 3);
    framed.push_str("TJ");
    framed.push_str(body);
    let sum: u32 = framed.chars().map(|c| c as u32).sum();
    framed.push(char::from((sum % 128) as u8));
    framed
}

/// Serial line to the APRS radio, 8N1, opened once at startup and
/// shared between the listener and the beacon.
pub struct GpsLink {
    port: Box<dyn SerialPort>,
    settle: Duration,
}

impl GpsLink {
    pub fn open(cfg: &GpsConfig) -> Result<Self> {
        let port = serialport::new(cfg.serial_dev.as_str(), cfg.baud)
            .timeout(Duration::from_millis(cfg.read_timeout_ms.unwrap_or(1_000)))
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .open()
            .with_context(|| format!("open aprs tty {}", cfg.serial_dev))?;
        Ok(Self { port, settle: Duration::from_millis(cfg.settle_ms.unwrap_or(500)) })
    }

    /// Send one line; the radio expects newline-terminated commands.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = line.as_bytes().to_vec();
        data.push(b'\n');
        self.port.write_all(&data).context("aprs write")?;
        Ok(())
    }

    /// Drain one receive burst in two passes: whatever is buffered now,
    /// then a settle pause and a second pass for the tail of a burst
    /// still arriving. Empty when the radio is quiet.
    pub fn drain_burst(&mut self) -> Result<Vec<u8>> {
        let pending = self.port.bytes_to_read().context("aprs poll")?;
        if pending == 0 {
            return Ok(Vec::new());
        }
        let mut burst = self.read_pending(pending)?;
        thread::sleep(self.settle);
        let tail = self.port.bytes_to_read().context("aprs poll")?;
        if tail > 0 {
            burst.extend(self.read_pending(tail)?);
        }
        Ok(burst)
    }

    fn read_pending(&mut self, count: u32) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; count as usize];
        self.port.read_exact(&mut buf).context("aprs read")?;
        Ok(buf)
    }
}

/// Log everything the radio hands us.
pub fn run_listener(link: &Arc<Mutex<GpsLink>>, idle_poll: Duration) -> Result<()> {
    loop {
        let burst = link.lock().unwrap().drain_burst()?;
        if burst.is_empty() {
            thread::sleep(idle_poll);
            continue;
        }
        info!("GOT: {}", String::from_utf8_lossy(&burst).trim_end());
    }
}

/// Beacon period in seconds, adjusted by the mode handlers while the
/// beacon thread sleeps on it.
pub struct BeaconCell(AtomicU64);

impl BeaconCell {
    pub fn new(secs: u64) -> Self {
        Self(AtomicU64::new(secs))
    }

    pub fn secs(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn set_secs(&self, secs: u64) {
        self.0.store(secs, Ordering::Release);
    }
}

/// Periodic status beacon over APRS.
pub struct Beacon {
    link: Arc<Mutex<GpsLink>>,
    registry: Arc<StateRegistry>,
    mode: Arc<PowerModeCell>,
    period: Arc<BeaconCell>,
}

impl Beacon {
    pub fn new(
        link: Arc<Mutex<GpsLink>>,
        registry: Arc<StateRegistry>,
        mode: Arc<PowerModeCell>,
        period: Arc<BeaconCell>,
    ) -> Self {
        Self { link, registry, mode, period }
    }

    pub fn beacon_once(&mut self) -> Result<()> {
        let volts = self.registry.get(StateField::BatteryBusVolts);
        let report = status_report(self.mode.load(), volts);
        self.link.lock().unwrap().send_line(&frame_command(&report))?;
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            self.beacon_once()?;
            thread::sleep(Duration::from_secs(self.period.secs()));
        }
    }
}

// APRS status reports start with '>'.
fn status_report(mode: PowerMode, volts: Option<f64>) -> String {
    match volts {
        Some(volts) => format!(">{mode} {volts:.2}V"),
        None => format!(">{mode}"),
    }
}

/// Ground-test console: read command bodies from stdin, frame them,
/// send them. Ends when stdin closes.
pub fn run_console(link: &Arc<Mutex<GpsLink>>) -> Result<()> {
    let stdin = io::stdin();
    loop {
        print!("Type Command: ");
        io::stdout().flush().context("console prompt")?;
        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).context("console read")?;
        if read == 0 {
            bail!("console input closed");
        }
        let body = line.trim_end_matches(['\r', '\n']);
        link.lock().unwrap().send_line(&frame_command(body))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_carries_prefix_and_checksum() {
        // 'T' + 'J' + 'A' sums to 223; 223 mod 128 is 95, '_'.
        assert_eq!(frame_command("A"), "TJA_");
    }

    #[test]
    fn checksum_covers_the_prefix_alone_for_empty_bodies() {
        let framed = frame_command("");
        assert_eq!(framed.len(), 3);
        assert_eq!(framed.chars().last(), Some(char::from(30)));
    }

    #[test]
    fn checksum_stays_inside_ascii() {
        for body in ["", "A", "hello world", "B9600", "\u{00e9}clair"] {
            let check = frame_command(body).chars().last().unwrap();
            assert!((check as u32) < 128, "checksum escaped ascii for {body:?}");
        }
    }

    #[test]
    fn status_report_includes_mode_and_volts() {
        assert_eq!(status_report(PowerMode::Normal, Some(4.05)), ">normal 4.05V");
        assert_eq!(status_report(PowerMode::LowPower, None), ">low-power");
    }

    #[test]
    fn beacon_cell_swaps_cadence() {
        let cell = BeaconCell::new(BEACON_NORMAL_SECS);
        assert_eq!(cell.secs(), 60);
        cell.set_secs(BEACON_LOW_POWER_SECS);
        assert_eq!(cell.secs(), 120);
    }
}
