#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Fixed-capacity byte ring buffer shared between a network producer and a
//! stream consumer.
//!
//! The ring holds the sliding window of a live transfer: the producer copies
//! incoming chunks behind the `head` cursor, the consumer drains from the
//! `tail` cursor, and both cursors are published atomically so each side can
//! snapshot the other without taking its lock. A reserved headroom of
//! [`WRITE_PADDING`] bytes keeps the buffer from ever filling completely,
//! which makes `head == tail` unambiguously mean "empty".
//!
//! The ring itself performs no blocking and no locking. Serializing the
//! producer against seek-time cursor rewrites, and waking a consumer when
//! data arrives, are the caller's concern.

mod ring;

pub use crate::ring::{RingBuffer, WRITE_PADDING};

use std::num::NonZeroUsize;

/// Boundary the ring capacity is rounded up to (64 KiB).
pub const RING_ALIGNMENT: usize = 64 * 1024;

/// Aligns `value` up to a multiple of `alignment`.
///
/// Zero stays zero; every other value is rounded to the next boundary. The
/// alignment is a [`NonZeroUsize`] so a zero alignment is unrepresentable
/// rather than a runtime error.
#[must_use]
pub const fn align_up(value: usize, alignment: NonZeroUsize) -> usize {
    let alignment = alignment.get();
    if value == 0 {
        0
    } else {
        value + ((alignment - (value % alignment)) % alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).expect("non-zero alignment required")
    }

    #[test]
    fn align_up_zero_stays_zero() {
        assert_eq!(align_up(0, nz(65536)), 0);
    }

    #[test]
    fn align_up_already_aligned() {
        assert_eq!(align_up(65536, nz(65536)), 65536);
        assert_eq!(align_up(131072, nz(65536)), 131072);
    }

    #[test]
    fn align_up_rounds_to_next_boundary() {
        assert_eq!(align_up(1, nz(65536)), 65536);
        assert_eq!(align_up(65537, nz(65536)), 131072);
        assert_eq!(align_up(100_000, nz(65536)), 131072);
    }

    #[test]
    fn align_up_small_alignment() {
        assert_eq!(align_up(7, nz(4)), 8);
        assert_eq!(align_up(8, nz(4)), 8);
    }
}
