use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::info;

use crate::radio::Radio;

/// Drain unsolicited modem traffic into the log, one line at a time.
///
/// Ring alerts arrive here once `AT+SBDMTA=1` is accepted. The loop
/// never opens the link itself: when the mode handler has closed it,
/// the pass ends with an error and the unit stays down until resumed.
pub fn run_listener(radio: &Arc<Mutex<Radio>>, idle_poll: Duration) -> Result<()> {
    let mut line: Vec<u8> = Vec::new();
    loop {
        let byte = {
            let mut radio = radio.lock().unwrap();
            if !radio.link_open() {
                bail!("modem link closed");
            }
            radio.receive()
        };
        match byte {
            Some(b'\r') | Some(b'\n') => {
                if !line.is_empty() {
                    report(String::from_utf8_lossy(&line).trim());
                    line.clear();
                }
            }
            Some(byte) => line.push(byte),
            None => thread::sleep(idle_poll),
        }
    }
}

fn report(text: &str) {
    if text == "SBDRING" {
        info!("modem ring alert");
    } else {
        info!("modem: {text}");
    }
}
