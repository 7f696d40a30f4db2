//! Output decorator
//!
//! Sits between a build and its console. Bytes always reach the inner
//! writer untouched; completed lines are copied onto the relay queue without
//! ever waiting for it.

use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;

use super::writer::RelayCounters;

/// `Write` adapter mirroring every line to a log relay
pub struct LogFilterDecorator<W: Write> {
    inner: W,
    line: Vec<u8>,
    relay: Option<Sender<String>>,
    counters: Arc<RelayCounters>,
}

impl<W: Write> LogFilterDecorator<W> {
    pub(crate) fn new(inner: W, relay: Sender<String>, counters: Arc<RelayCounters>) -> Self {
        Self {
            inner,
            line: Vec::new(),
            relay: Some(relay),
            counters,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Emits the pending partial line, flushes and detaches from the relay
    pub fn finish(&mut self) -> io::Result<()> {
        self.emit_partial();
        self.relay = None;
        self.inner.flush()
    }

    fn mirror(&mut self, bytes: &[u8]) {
        if self.relay.is_none() {
            return;
        }

        for chunk in bytes.split_inclusive(|b| *b == b'\n') {
            if self.relay.is_none() {
                break;
            }
            self.line.extend_from_slice(chunk);
            if chunk.ends_with(b"\n") {
                let line = std::mem::take(&mut self.line);
                self.send(&line);
            }
        }
    }

    fn emit_partial(&mut self) {
        if self.line.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.line);
        self.send(&line);
    }

    fn send(&mut self, line: &[u8]) {
        let Some(relay) = &self.relay else {
            return;
        };

        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches(['\r', '\n']).to_string();

        match relay.try_send(text) {
            Ok(()) => self.counters.record_queued(),
            Err(TrySendError::Full(_)) => self.counters.record_overflow(),
            // Relay gone: keep writing to the console only
            Err(TrySendError::Closed(_)) => {
                self.relay = None;
                self.line.clear();
            }
        }
    }
}

impl<W: Write> Write for LogFilterDecorator<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.mirror(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Drop for LogFilterDecorator<W> {
    fn drop(&mut self) {
        self.emit_partial();
    }
}
