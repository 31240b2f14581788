use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link is not open")]
    NotOpen,
    #[error("serial port: {0}")]
    Port(#[from] serialport::Error),
    #[error("link i/o: {0}")]
    Io(#[from] io::Error),
}

/// Byte transport to the modem.
///
/// One driver owns its link exclusively. The trait exists so bench and
/// test builds can substitute a scripted transport for the tty.
pub trait ModemLink: Send {
    /// Open the transport. Opening an already-open link is a no-op.
    fn open(&mut self) -> Result<(), LinkError>;
    fn close(&mut self) -> Result<(), LinkError>;
    fn is_open(&self) -> bool;
    fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError>;
    /// One byte, or `None` when the read timeout passes without data.
    fn read_byte(&mut self) -> Result<Option<u8>, LinkError>;
    fn flush(&mut self) -> Result<(), LinkError>;
}

/// Production link over a serial tty, 8N1.
pub struct TtyLink {
    dev: String,
    baud: u32,
    read_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl TtyLink {
    pub fn new(dev: &str, baud: u32, read_timeout: Duration) -> Self {
        Self { dev: dev.to_string(), baud, read_timeout, port: None }
    }
}

impl ModemLink for TtyLink {
    fn open(&mut self) -> Result<(), LinkError> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(self.dev.as_str(), self.baud)
            .timeout(self.read_timeout)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .open()?;
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<(), LinkError> {
        // Dropping the handle closes the tty.
        self.port = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotOpen)?;
        port.write_all(data)?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotOpen)?;
        let mut byte = [0u8; 1];
        match port.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotOpen)?;
        port.flush()?;
        Ok(())
    }
}
