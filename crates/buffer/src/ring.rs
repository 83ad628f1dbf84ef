//! SPSC byte ring with atomic cursors.
//!
//! One producer (the transfer worker) advances `head`, one consumer (the
//! stream reader) advances `tail`. Cursor publication uses release stores
//! paired with acquire loads, so bytes copied into the ring are visible to
//! the consumer before the new `head` is, and slots drained by the consumer
//! are reusable by the producer only after the new `tail` is visible.
//!
//! The storage is a `Box<[UnsafeCell<u8>]>` rather than a locked `Vec` so
//! both sides can copy concurrently in disjoint regions. The safety argument
//! lives on [`RingBuffer::try_write`] and [`RingBuffer::read`].

use std::cell::UnsafeCell;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{align_up, RING_ALIGNMENT};

/// Headroom reserved on every write so the ring can never fill completely.
///
/// The producer refuses a chunk unless `available >= len + WRITE_PADDING`,
/// which guarantees `head` never catches up to `tail` through writes alone.
/// `head == tail` therefore always means the ring is empty. The value is
/// the largest chunk a transport is expected to deliver in one callback
/// (16 KiB), so a refused chunk always fits once the consumer drains.
pub const WRITE_PADDING: usize = 16 * 1024;

/// Fixed-capacity circular byte region with producer and consumer cursors.
///
/// Thread roles are part of the contract, not the type system:
///
/// - exactly one producer calls [`try_write`](Self::try_write) at a time;
/// - exactly one consumer calls [`read`](Self::read) at a time;
/// - [`set_tail`](Self::set_tail) and [`reset`](Self::reset) may only run
///   while both sides are quiescent (the stream holds both of its locks, or
///   the worker is joined).
///
/// The live-stream control layer upholds these with its read and write
/// mutexes; the ring itself never blocks.
pub struct RingBuffer {
    storage: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: all cross-thread access to `storage` is bounded by the acquire /
// release pairs on `head` and `tail` together with the single-producer,
// single-consumer contract documented on the type. The producer only writes
// slots the consumer cannot read yet (past `head`), and the consumer only
// reads slots the producer has published (before `head`).
unsafe impl Send for RingBuffer {}
// SAFETY: see above.
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Allocates a ring for the requested stream buffer size.
    ///
    /// The actual capacity is `buffersize + WRITE_PADDING` rounded up to a
    /// [`RING_ALIGNMENT`] boundary, so even a zero request yields a usable
    /// ring strictly larger than the padding.
    #[must_use]
    pub fn new(buffersize: usize) -> Self {
        const ALIGNMENT: NonZeroUsize = match NonZeroUsize::new(RING_ALIGNMENT) {
            Some(alignment) => alignment,
            None => unreachable!(),
        };
        let capacity = align_up(buffersize.saturating_add(WRITE_PADDING), ALIGNMENT);
        debug_assert!(capacity > WRITE_PADDING);

        let storage = (0..capacity)
            .map(|_| UnsafeCell::new(0u8))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            storage,
            capacity,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Total capacity in bytes, including the reserved padding.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` when no unread bytes are buffered.
    ///
    /// Because writes always leave [`WRITE_PADDING`] bytes of headroom, equal
    /// cursors can only mean empty, never full.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Atomic snapshot of `(head, tail)`.
    #[must_use]
    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.head.load(Ordering::Acquire),
            self.tail.load(Ordering::Acquire),
        )
    }

    /// Bytes the producer could currently write, before padding is applied.
    #[must_use]
    pub fn available_to_write(&self) -> usize {
        let (head, tail) = self.snapshot();
        if head < tail {
            tail - head
        } else {
            self.capacity - head + tail
        }
    }

    /// Copies `data` into the ring, or refuses it entirely.
    ///
    /// Returns `false` without writing anything when the ring lacks
    /// `data.len() + WRITE_PADDING` bytes of space; the caller is expected to
    /// pause its source and re-offer the same bytes later. A successful write
    /// is always whole, so the consumer never observes a split chunk.
    ///
    /// Producer side only; calls must be serialized by the caller.
    pub fn try_write(&self, data: &[u8]) -> bool {
        if data.is_empty() {
            return true;
        }

        let mut head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);

        let available = if head < tail {
            tail - head
        } else {
            self.capacity - head + tail
        };
        if available < data.len() + WRITE_PADDING {
            return false;
        }

        let mut written = 0;
        while written < data.len() {
            // Copy up to the consumer's cursor or the end of the storage,
            // whichever comes first, then wrap.
            let run_end = if head < tail { tail } else { self.capacity };
            let chunk = (data.len() - written).min(run_end - head);

            for (offset, byte) in data[written..written + chunk].iter().enumerate() {
                // SAFETY: slots in `[head, head + chunk)` are strictly inside
                // the free region computed above, so the consumer does not
                // read them until the release store of `head` below, and no
                // other producer exists.
                unsafe { *self.storage[head + offset].get() = *byte };
            }

            head += chunk;
            written += chunk;
            if head >= self.capacity {
                head = 0;
            }
        }

        self.head.store(head, Ordering::Release);
        true
    }

    /// Drains up to `dest.len()` buffered bytes into `dest`.
    ///
    /// Returns the number of bytes copied, which is zero when the ring is
    /// empty. Consumer side only; calls must be serialized by the caller.
    pub fn read(&self, dest: &mut [u8]) -> usize {
        if dest.is_empty() {
            return 0;
        }

        let head = self.head.load(Ordering::Acquire);
        let mut tail = self.tail.load(Ordering::Acquire);

        let mut copied = 0;
        while copied < dest.len() && tail != head {
            let run_end = if tail < head { head } else { self.capacity };
            let chunk = (dest.len() - copied).min(run_end - tail);

            for offset in 0..chunk {
                // SAFETY: slots in `[tail, tail + chunk)` were published by
                // the producer's release store of `head`, and the producer
                // does not reuse them until the release store of `tail`
                // below.
                dest[copied + offset] = unsafe { *self.storage[tail + offset].get() };
            }

            tail += chunk;
            copied += chunk;
            if tail >= self.capacity {
                tail = 0;
            }
        }

        self.tail.store(tail, Ordering::Release);
        copied
    }

    /// Moves the consumer cursor to an absolute ring index.
    ///
    /// Used by in-buffer seeks. Only valid while both sides are quiescent;
    /// see the type-level contract.
    pub fn set_tail(&self, index: usize) {
        debug_assert!(index < self.capacity);
        self.tail.store(index, Ordering::Release);
    }

    /// Empties the ring by resetting both cursors to zero.
    ///
    /// Only valid while both sides are quiescent.
    pub fn reset(&self) {
        self.head.store(0, Ordering::Release);
        self.tail.store(0, Ordering::Release);
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (head, tail) = self.snapshot();
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("head", &head)
            .field("tail", &tail)
            .finish()
    }
}
