//! Deterministic in-process transport for tests.
//!
//! [`ScriptedTransport`] models a byte-range server holding one contiguous
//! object: it honors `set_range`, announces the effective start through a
//! `Content-Range` header line, and delivers the body in fixed-size chunks
//! with the same tick/pause/re-deliver discipline as the HTTP adapter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::{SinkAction, StreamSink, TickAction, TransferOutcome, Transport, TransportError};

/// Scriptable [`Transport`] replaying an in-memory body.
pub struct ScriptedTransport {
    body: Vec<u8>,
    origin: u64,
    chunk_size: usize,
    tick_interval: Duration,
    range_start: Option<u64>,
    fail_set_range: bool,
    fail_perform: Option<String>,
    pauses: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    /// Creates a transport serving `body`, whose first byte sits at
    /// server-absolute offset 0.
    #[must_use]
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            origin: 0,
            chunk_size: 8 * 1024,
            tick_interval: Duration::from_millis(1),
            range_start: None,
            fail_set_range: false,
            fail_perform: None,
            pauses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of sink-requested pauses, shared with the caller so tests
    /// can observe backpressure after the transport has been boxed.
    #[must_use]
    pub fn pause_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pauses)
    }

    /// Places the first byte of the body at server-absolute `origin`.
    #[must_use]
    pub fn with_origin(mut self, origin: u64) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the chunk size offered per `on_data` call.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Makes every [`Transport::set_range`] call fail, to exercise the
    /// fatal-seek path.
    #[must_use]
    pub fn with_failing_set_range(mut self) -> Self {
        self.fail_set_range = true;
        self
    }

    /// Makes every [`Transport::perform`] call fail immediately with
    /// `message`, to exercise transfer-failure paths.
    #[must_use]
    pub fn with_failing_perform(mut self, message: impl Into<String>) -> Self {
        self.fail_perform = Some(message.into());
        self
    }
}

impl Transport for ScriptedTransport {
    fn set_range(&mut self, start: u64) -> Result<(), TransportError> {
        if self.fail_set_range {
            return Err(TransportError::Configuration(
                "scripted range rejection".to_owned(),
            ));
        }
        self.range_start = Some(start);
        Ok(())
    }

    fn perform(&mut self, sink: &dyn StreamSink) -> TransferOutcome {
        if let Some(message) = &self.fail_perform {
            return TransferOutcome::Failed(message.clone());
        }

        let total = self.origin + self.body.len() as u64;
        let start = self.range_start.unwrap_or(self.origin);
        if start < self.origin || start > total {
            return TransferOutcome::Failed(format!(
                "requested range {start} outside {}..{total}",
                self.origin
            ));
        }

        sink.on_header("Content-Type: application/octet-stream");
        sink.on_header(&format!(
            "Content-Range: bytes {start}-{}/{total}",
            total.saturating_sub(1)
        ));

        let mut offset = (start - self.origin) as usize;
        loop {
            match sink.on_tick() {
                TickAction::Abort => return TransferOutcome::Aborted,
                TickAction::Resume | TickAction::Continue => {}
            }

            if offset >= self.body.len() {
                return TransferOutcome::Completed;
            }

            let end = (offset + self.chunk_size).min(self.body.len());
            match sink.on_data(&self.body[offset..end]) {
                SinkAction::Consumed => offset = end,
                SinkAction::Pause => {
                    self.pauses.fetch_add(1, Ordering::Relaxed);
                    thread::sleep(self.tick_interval);
                }
            }
        }
    }
}
