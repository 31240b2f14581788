//! Scripted modem link for driver tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::link::{LinkError, ModemLink};

pub(crate) enum Step {
    Byte(u8),
    Silence,
    Drop,
}

pub(crate) struct FakeInner {
    open: bool,
    fail_open: bool,
    reads: VecDeque<Step>,
    writes: Vec<String>,
}

/// Each write is recorded, each read pops the next scripted step.
/// Clones share the script, so a test can keep one handle while the
/// radio owns the other.
#[derive(Clone)]
pub(crate) struct FakeLink(Arc<Mutex<FakeInner>>);

impl FakeLink {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(FakeInner {
            open: false,
            fail_open: false,
            reads: VecDeque::new(),
            writes: Vec::new(),
        })))
    }

    pub(crate) fn opened() -> Self {
        let link = Self::new();
        link.0.lock().unwrap().open = true;
        link
    }

    pub(crate) fn push_response(&self, text: &str) {
        let mut inner = self.0.lock().unwrap();
        for byte in text.bytes() {
            inner.reads.push_back(Step::Byte(byte));
        }
    }

    pub(crate) fn push_silence(&self) {
        self.0.lock().unwrap().reads.push_back(Step::Silence);
    }

    pub(crate) fn push_drop(&self) {
        self.0.lock().unwrap().reads.push_back(Step::Drop);
    }

    pub(crate) fn fail_open(&self, fail: bool) {
        self.0.lock().unwrap().fail_open = fail;
    }

    pub(crate) fn writes(&self) -> Vec<String> {
        self.0.lock().unwrap().writes.clone()
    }

    pub(crate) fn is_open_now(&self) -> bool {
        self.0.lock().unwrap().open
    }

    pub(crate) fn pending_reads(&self) -> usize {
        self.0.lock().unwrap().reads.len()
    }
}

impl ModemLink for FakeLink {
    fn open(&mut self) -> Result<(), LinkError> {
        let mut inner = self.0.lock().unwrap();
        if inner.fail_open {
            return Err(LinkError::NotOpen);
        }
        inner.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), LinkError> {
        self.0.lock().unwrap().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.0.lock().unwrap().open
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        let mut inner = self.0.lock().unwrap();
        if !inner.open {
            return Err(LinkError::NotOpen);
        }
        inner.writes.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, LinkError> {
        let mut inner = self.0.lock().unwrap();
        if !inner.open {
            return Err(LinkError::NotOpen);
        }
        match inner.reads.pop_front() {
            Some(Step::Byte(byte)) => Ok(Some(byte)),
            Some(Step::Silence) | None => Ok(None),
            Some(Step::Drop) => Err(LinkError::NotOpen),
        }
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}
