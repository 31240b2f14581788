use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::link::ModemLink;
use crate::protocol::{response_code, Command, ResponseOutcome, REGISTRATION_RING, SIGNAL_NONE};
use crate::rail::{NoPowerRail, PowerRail};
use crate::RadioConfig;

/// Driver for the satellite modem.
///
/// Owns its serial link exclusively. Callers that cannot handle link
/// trouble never see it raised: `functional`, `send` and `receive`
/// degrade, and `exchange` reports trouble through [`ResponseOutcome`].
pub struct Radio {
    link: Box<dyn ModemLink>,
    rail: Box<dyn PowerRail>,
    response_timeout: Duration,
    settle_after_send: Duration,
    signal_poll: Duration,
    registration_poll: Duration,
    startup_checks: u32,
    ever_opened: bool,
}

impl Radio {
    pub fn new(link: Box<dyn ModemLink>, cfg: &RadioConfig) -> Self {
        Self {
            link,
            rail: Box::new(NoPowerRail),
            response_timeout: Duration::from_millis(cfg.response_timeout_ms.unwrap_or(10_000)),
            settle_after_send: Duration::from_millis(cfg.settle_ms.unwrap_or(1_000)),
            signal_poll: Duration::from_millis(cfg.signal_poll_ms.unwrap_or(1_000)),
            registration_poll: Duration::from_millis(cfg.registration_poll_ms.unwrap_or(0)),
            startup_checks: cfg.startup_checks.unwrap_or(5),
            ever_opened: false,
        }
    }

    pub fn with_rail(mut self, rail: Box<dyn PowerRail>) -> Self {
        self.rail = rail;
        self
    }

    pub fn link_open(&self) -> bool {
        self.link.is_open()
    }

    /// Check the link, opening it if needed.
    ///
    /// The first successful open runs the full readiness check; a link
    /// found closed later is only reopened. Never raises.
    pub fn functional(&mut self) -> bool {
        if self.link.is_open() {
            return true;
        }
        if let Err(err) = self.link.open() {
            debug!("modem link open failed: {err}");
            return false;
        }
        if self.ever_opened {
            return true;
        }
        self.ever_opened = true;
        if let Err(err) = self.link.flush() {
            warn!("modem flush after first open failed: {err}");
            return false;
        }
        match self.check_ready(self.startup_checks) {
            Ok(ready) => ready,
            Err(err) => {
                warn!("modem readiness check failed: {err:#}");
                false
            }
        }
    }

    /// Full readiness check: probe, wait for signal, then poll SBD
    /// registration up to `max_attempts` times.
    ///
    /// True means the network reported ring registration within the
    /// attempt budget; ring alerts are requested before returning.
    /// Exchange failures abort the check.
    pub fn check_ready(&mut self, max_attempts: u32) -> Result<bool> {
        // Best-effort probe; the response content does not matter.
        let _ = self.command(Command::Probe);

        self.wait_for_signal()?;

        for attempt in 0..max_attempts {
            let payload = match self.command(Command::CheckRegistration) {
                ResponseOutcome::Ok(payload) => payload,
                ResponseOutcome::LinkUnavailable => bail!("link lost while polling registration"),
                ResponseOutcome::ProtocolError(payload) => {
                    bail!("registration poll rejected: {payload:?}")
                }
            };
            let code = response_code(&payload)
                .with_context(|| format!("unparseable registration response {payload:?}"))?;
            if code == REGISTRATION_RING {
                let outcome = self.command(Command::RingAlertOn);
                if !outcome.is_ok() {
                    warn!("ring alert enable failed: {outcome:?}");
                }
                return Ok(true);
            }
            if attempt + 1 < max_attempts && !self.registration_poll.is_zero() {
                thread::sleep(self.registration_poll);
            }
        }
        Ok(false)
    }

    /// Poll signal quality until the modem reports any constellation
    /// signal. Returns early only on link loss or a rejected query.
    fn wait_for_signal(&mut self) -> Result<()> {
        loop {
            let payload = match self.command(Command::SignalQuality) {
                ResponseOutcome::Ok(payload) => payload,
                ResponseOutcome::LinkUnavailable => bail!("link lost while waiting for signal"),
                ResponseOutcome::ProtocolError(payload) => {
                    bail!("signal query rejected: {payload:?}")
                }
            };
            let code = response_code(&payload)
                .with_context(|| format!("unparseable signal response {payload:?}"))?;
            if code != SIGNAL_NONE {
                return Ok(());
            }
            thread::sleep(self.signal_poll);
        }
    }

    pub fn command(&mut self, cmd: Command) -> ResponseOutcome {
        self.exchange(cmd.wire())
    }

    /// One command/response exchange.
    ///
    /// The command is written CRLF-terminated, then bytes accumulate
    /// until the modem answers `OK` or `ERROR`; the terminator is
    /// stripped from the returned payload. A modem that answers with
    /// neither before the response deadline yields a protocol error
    /// carrying the partial payload.
    pub fn exchange(&mut self, command: &str) -> ResponseOutcome {
        if !self.link.is_open() {
            return ResponseOutcome::LinkUnavailable;
        }

        // Embedded line breaks would cut the command short on the wire.
        let mut line = command.replace("\r\n", "");
        line.push_str("\r\n");

        if let Err(err) = self.link.write_all(line.as_bytes()) {
            warn!("modem write failed: {err}");
            return ResponseOutcome::LinkUnavailable;
        }

        let deadline = Instant::now() + self.response_timeout;
        let mut raw: Vec<u8> = Vec::new();
        let outcome = loop {
            match self.link.read_byte() {
                Ok(Some(byte)) => raw.push(byte),
                Ok(None) => {}
                Err(err) => {
                    warn!("modem read failed: {err}");
                    return ResponseOutcome::LinkUnavailable;
                }
            }
            let text = String::from_utf8_lossy(&raw);
            if let Some(at) = text.find("OK") {
                break ResponseOutcome::Ok(text[..at].trim().to_string());
            }
            if let Some(at) = text.find("ERROR") {
                break ResponseOutcome::ProtocolError(text[..at].trim().to_string());
            }
            if Instant::now() >= deadline {
                break ResponseOutcome::ProtocolError(text.trim().to_string());
            }
        };

        if let Err(err) = self.link.flush() {
            warn!("modem flush failed: {err}");
        }
        outcome
    }

    /// Send a raw command line and settle afterwards.
    ///
    /// Returns the response payload and whether the modem accepted the
    /// command. An unusable link yields an empty payload and false.
    pub fn send(&mut self, message: &str) -> (String, bool) {
        if !self.functional() {
            return (String::new(), false);
        }
        let outcome = self.exchange(message);
        thread::sleep(self.settle_after_send);
        match outcome {
            ResponseOutcome::Ok(payload) => (payload, true),
            ResponseOutcome::ProtocolError(payload) => (payload, false),
            ResponseOutcome::LinkUnavailable => (String::new(), false),
        }
    }

    /// Read at most one byte, if the link yields one within its timeout.
    pub fn receive(&mut self) -> Option<u8> {
        if !self.functional() {
            return None;
        }
        match self.link.read_byte() {
            Ok(byte) => byte,
            Err(err) => {
                warn!("modem read failed: {err}");
                None
            }
        }
    }

    /// Open the link when leaving low-power mode. Link trouble is
    /// logged, not returned.
    pub fn enable(&mut self) {
        if let Err(err) = self.link.open() {
            warn!("modem enable failed: {err}");
        }
    }

    /// Close the link when entering low-power mode. Link trouble is
    /// logged, not returned.
    pub fn disable(&mut self) {
        if let Err(err) = self.link.close() {
            warn!("modem disable failed: {err}");
        }
    }

    /// Power-cycle the modem through its rail.
    pub fn reset(&mut self) -> Result<()> {
        info!("modem reset requested");
        self.rail.power_cycle().context("modem power rail")
    }
}
