//! Stream control: lifecycle, positions, and the transfer worker.
//!
//! Two threads touch the shared state. The control thread (the caller) runs
//! `start`/`stop`/`seek`/`read`; the transfer worker runs the transport and
//! feeds the sink callbacks. The control mutex serializes control operations
//! and doubles as the read lock, with its condvar acting as the "ring has
//! data" signal. A separate write mutex serializes the producer against
//! seek-time cursor rewrites. The hot paths only ever take their own side's
//! lock and snapshot the peer cursor atomically.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use buffer::RingBuffer;
use tracing::{debug, trace};
use transport::{
    HttpTransport, SinkAction, StreamSink, TickAction, TransferOutcome, Transport, TransportError,
};

use crate::error::StreamError;
use crate::gate::Gate;
use crate::header::parse_content_range;

/// Server-absolute producer-side positions, guarded by the write mutex.
#[derive(Default)]
struct WritePositions {
    /// First byte the current transfer delivered.
    startpos: u64,
    /// Next byte the producer will write.
    writepos: u64,
}

/// Control-side state. Holding this mutex is what serializes control
/// operations against each other and against the consumer.
#[derive(Default)]
struct ControlState {
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    ring: RingBuffer,
    write: Mutex<WritePositions>,
    control: Mutex<ControlState>,
    has_data: Condvar,
    /// Next byte the consumer will read. Advanced by `read` under the
    /// control lock; rewritten directly by the header adapter and by seeks.
    readpos: AtomicU64,
    /// High-water mark of `writepos` since construction or the last `stop`.
    length: AtomicU64,
    stop: AtomicBool,
    paused: AtomicBool,
    started: Gate,
    /// Transport session, present from `start` to `stop`. The worker takes
    /// it for the duration of a run and puts it back before exiting; the
    /// spawn/join edges are the handoff synchronization.
    session: Mutex<Option<Box<dyn Transport>>>,
    outcome: Mutex<Option<TransferOutcome>>,
}

impl Shared {
    fn lock_write(&self) -> std::sync::MutexGuard<'_, WritePositions> {
        self.write.lock().expect("write mutex poisoned")
    }

    fn lock_control(&self) -> std::sync::MutexGuard<'_, ControlState> {
        self.control.lock().expect("control mutex poisoned")
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Box<dyn Transport>>> {
        self.session.lock().expect("session mutex poisoned")
    }

    fn outcome_failure(&self) -> Option<String> {
        match &*self.outcome.lock().expect("outcome mutex poisoned") {
            Some(TransferOutcome::Failed(message)) => Some(message.clone()),
            _ => None,
        }
    }
}

impl StreamSink for Shared {
    fn on_header(&self, line: &str) {
        let Some(start) = parse_content_range(line) else {
            return;
        };

        // The server's reported start anchors the stream: when the transfer
        // (re)starts, all three positions collapse onto it.
        let mut write = self.lock_write();
        write.startpos = start;
        write.writepos = start;
        self.readpos.store(start, Ordering::Release);
        debug!(start, "stream origin set from content-range");
    }

    fn on_data(&self, chunk: &[u8]) -> SinkAction {
        if chunk.is_empty() {
            return SinkAction::Consumed;
        }

        let mut write = self.lock_write();

        // All-or-nothing: a chunk that does not fit (with headroom) pauses
        // the transport, which re-delivers the same bytes after resume.
        if !self.ring.try_write(chunk) {
            self.paused.store(true, Ordering::Release);
            trace!(len = chunk.len(), "insufficient ring space, pausing");
            return SinkAction::Pause;
        }

        write.writepos += chunk.len() as u64;
        self.length.fetch_max(write.writepos, Ordering::AcqRel);
        drop(write);

        self.has_data.notify_all();
        self.started.set();
        SinkAction::Consumed
    }

    fn on_tick(&self) -> TickAction {
        if self.stop.swap(false, Ordering::AcqRel) {
            return TickAction::Abort;
        }
        if self.paused.swap(false, Ordering::AcqRel) {
            return TickAction::Resume;
        }
        TickAction::Continue
    }
}

/// Seekable buffer over a live HTTP byte-range transfer.
///
/// All methods take `&self`; internal locking makes the type safe to share
/// behind an [`Arc`] so one thread can block in [`read`](Self::read) while
/// another seeks or stops. There is still exactly one logical consumer:
/// concurrent `read` calls serialize, they do not fan out.
pub struct LiveStream {
    shared: Arc<Shared>,
}

impl LiveStream {
    /// Creates a stream whose ring buffer holds at least `buffersize` bytes.
    ///
    /// The allocation happens once, here; `start`/`stop` cycles reuse it.
    #[must_use]
    pub fn new(buffersize: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                ring: RingBuffer::new(buffersize),
                write: Mutex::new(WritePositions::default()),
                control: Mutex::new(ControlState::default()),
                has_data: Condvar::new(),
                readpos: AtomicU64::new(0),
                length: AtomicU64::new(0),
                stop: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                started: Gate::new(),
                session: Mutex::new(None),
                outcome: Mutex::new(None),
            }),
        }
    }

    /// Starts transferring from `url` and returns the starting read
    /// position (the offset the server reports, 0 when it reports none).
    ///
    /// Blocks until the first bytes arrive or the transfer ends.
    ///
    /// # Errors
    ///
    /// [`StreamError::AlreadyActive`] when a transfer is running,
    /// [`StreamError::Setup`] when the session cannot be created, and
    /// [`StreamError::TransferFailed`] when the transfer ends without
    /// producing any data.
    pub fn start(&self, url: &str) -> Result<u64, StreamError> {
        let transport = HttpTransport::new(url)?;
        self.start_with(Box::new(transport))
    }

    /// Starts transferring from an explicitly constructed transport
    /// session. See [`start`](Self::start) for semantics.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub fn start_with(&self, transport: Box<dyn Transport>) -> Result<u64, StreamError> {
        let mut control = self.shared.lock_control();
        if control.worker.is_some() {
            return Err(StreamError::AlreadyActive);
        }

        *self.shared.lock_session() = Some(transport);

        if let Err(err) = self.spawn_worker(&mut control) {
            *self.shared.lock_session() = None;
            return Err(StreamError::TransferFailed {
                message: format!("failed to spawn transfer worker: {err}"),
            });
        }
        self.shared.started.wait();

        if let Some(message) = self.shared.outcome_failure() {
            let no_data = {
                let write = self.shared.lock_write();
                write.writepos == write.startpos
            };
            if no_data {
                self.teardown_finished_worker(&mut control);
                return Err(StreamError::TransferFailed { message });
            }
        }

        Ok(self.shared.readpos.load(Ordering::Acquire))
    }

    /// Stops the transfer and returns the final read position, or 0 when no
    /// transfer was active. Never fails; resets every position, the ring,
    /// and the observed length.
    pub fn stop(&self) -> u64 {
        let mut control = self.shared.lock_control();
        let Some(worker) = control.worker.take() else {
            return 0;
        };

        self.shared.stop.store(true, Ordering::Release);
        let _ = worker.join();

        let position = self.shared.readpos.load(Ordering::Acquire);
        self.reset_stream_state(&mut control);
        self.shared.length.store(0, Ordering::Release);
        *self.shared.lock_session() = None;

        debug!(position, "stream stopped");
        position
    }

    /// Seeks to a server-absolute byte offset and returns the effective
    /// position.
    ///
    /// A target inside the buffered window moves the read cursor without
    /// any network traffic. Anything else stops the transfer and restarts
    /// it with a `Range` beginning at `target`; the returned position is
    /// then whatever start offset the server actually reports.
    ///
    /// # Errors
    ///
    /// [`StreamError::NotActive`] without a running transfer,
    /// [`StreamError::SeekFatal`] when the session rejects the new range
    /// (the stream is idle afterwards), and [`StreamError::SeekFailed`]
    /// when the restarted transfer fails.
    pub fn seek(&self, target: u64) -> Result<u64, StreamError> {
        let mut control = self.shared.lock_control();

        if target == self.shared.readpos.load(Ordering::Acquire) {
            return Ok(target);
        }
        if control.worker.is_none() {
            return Err(StreamError::NotActive { operation: "seek" });
        }

        {
            let write = self.shared.lock_write();
            let capacity = self.shared.ring.capacity() as u64;

            // Oldest offset still represented in the ring: once the window
            // has wrapped, the head cursor is the oldest byte.
            let min_buffered = if write.writepos - write.startpos > capacity {
                write.writepos - capacity
            } else {
                write.startpos
            };

            if target >= min_buffered && target <= write.writepos {
                let new_tail = if min_buffered == write.startpos {
                    // Not wrapped yet: offsets map linearly from the start
                    // of the storage.
                    (target - write.startpos) as usize
                } else {
                    let (head, _) = self.shared.ring.snapshot();
                    let head = head as u64;
                    let delta = target - min_buffered;
                    if delta >= capacity - head {
                        (delta - (capacity - head)) as usize
                    } else {
                        (head + delta) as usize
                    }
                };

                self.shared.ring.set_tail(new_tail);
                self.shared.readpos.store(target, Ordering::Release);
                debug!(target, new_tail, "in-buffer seek");
                return Ok(target);
            }
        }

        debug!(target, "target outside buffered window, restarting transfer");
        self.shared.stop.store(true, Ordering::Release);
        if let Some(worker) = control.worker.take() {
            let _ = worker.join();
        }

        self.reset_stream_state(&mut control);

        {
            let mut session = self.shared.lock_session();
            let reconfigured = match session.as_mut() {
                Some(session) => session.set_range(target),
                None => Err(TransportError::Configuration(
                    "transport session missing".to_owned(),
                )),
            };
            if let Err(err) = reconfigured {
                // The session cannot be trusted after a rejected range;
                // tear it down as a stop would.
                *session = None;
                return Err(StreamError::SeekFatal {
                    position: target,
                    message: err.to_string(),
                });
            }
        }

        if let Err(err) = self.spawn_worker(&mut control) {
            *self.shared.lock_session() = None;
            return Err(StreamError::SeekFailed {
                position: target,
                message: format!("failed to spawn transfer worker: {err}"),
            });
        }
        self.shared.started.wait();

        if let Some(message) = self.shared.outcome_failure() {
            return Err(StreamError::SeekFailed {
                position: target,
                message,
            });
        }

        Ok(self.shared.readpos.load(Ordering::Acquire))
    }

    /// Reads up to `dest.len()` bytes, waiting up to `timeout` for data.
    ///
    /// Returns the number of bytes copied; 0 means the timeout expired with
    /// the ring still empty, which is not an error. Works whether or not a
    /// transfer is active.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidArgument`] when `dest` is larger than the ring
    /// capacity.
    pub fn read(&self, dest: &mut [u8], timeout: Duration) -> Result<usize, StreamError> {
        if dest.len() > self.shared.ring.capacity() {
            return Err(StreamError::InvalidArgument(
                "read count exceeds buffer capacity",
            ));
        }
        if dest.is_empty() {
            return Ok(0);
        }

        let control = self.shared.lock_control();
        let (_control, wait) = self
            .shared
            .has_data
            .wait_timeout_while(control, timeout, |_| self.shared.ring.is_empty())
            .expect("control mutex poisoned");
        if wait.timed_out() {
            return Ok(0);
        }

        let copied = self.shared.ring.read(dest);
        self.shared
            .readpos
            .fetch_add(copied as u64, Ordering::AcqRel);
        Ok(copied)
    }

    /// Current read position as a server-absolute offset.
    #[must_use]
    pub fn position(&self) -> u64 {
        let _control = self.shared.lock_control();
        self.shared.readpos.load(Ordering::Acquire)
    }

    /// Highest write position observed since construction or the last
    /// [`stop`](Self::stop).
    #[must_use]
    pub fn length(&self) -> u64 {
        self.shared.length.load(Ordering::Acquire)
    }

    /// Spawns the transfer worker for the session currently in the slot.
    fn spawn_worker(&self, control: &mut ControlState) -> std::io::Result<()> {
        self.shared.started.reset();
        *self.shared.outcome.lock().expect("outcome mutex poisoned") = None;

        let shared = Arc::clone(&self.shared);
        let worker = thread::Builder::new()
            .name("livestream-transfer".to_owned())
            .spawn(move || transfer_worker(&shared))?;
        control.worker = Some(worker);
        Ok(())
    }

    /// Joins a worker that has already finished and returns the stream to
    /// its idle state, keeping `length` intact.
    fn teardown_finished_worker(&self, control: &mut ControlState) {
        if let Some(worker) = control.worker.take() {
            let _ = worker.join();
        }
        self.reset_stream_state(control);
        *self.shared.lock_session() = None;
    }

    /// Resets flags, positions, and ring cursors between transfer runs.
    ///
    /// `length` deliberately survives: it is the high-water mark across the
    /// whole stream, reset only by `stop`. The exclusive borrow of the
    /// control state is the proof that no worker is running.
    fn reset_stream_state(&self, control: &mut ControlState) {
        debug_assert!(control.worker.is_none());

        self.shared.started.reset();
        self.shared.paused.store(false, Ordering::Release);
        self.shared.stop.store(false, Ordering::Release);

        {
            let mut write = self.shared.lock_write();
            write.startpos = 0;
            write.writepos = 0;
        }
        self.shared.readpos.store(0, Ordering::Release);
        self.shared.ring.reset();
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStream")
            .field("capacity", &self.shared.ring.capacity())
            .field("length", &self.length())
            .finish()
    }
}

/// Worker body: one transport run, then exit.
///
/// Retry is not this layer's concern; the control thread decides whether to
/// start again. The gate is released unconditionally so a waiter in
/// `start`/`seek` always wakes, whether data flowed or the transfer died
/// first.
fn transfer_worker(shared: &Arc<Shared>) {
    let session = shared.lock_session().take();

    let outcome = match session {
        Some(mut session) => {
            let outcome = session.perform(&**shared);
            shared.lock_session().replace(session);
            outcome
        }
        None => TransferOutcome::Failed("transport session missing".to_owned()),
    };

    debug!(?outcome, "transfer worker finished");
    *shared.outcome.lock().expect("outcome mutex poisoned") = Some(outcome);
    shared.started.set();
}
