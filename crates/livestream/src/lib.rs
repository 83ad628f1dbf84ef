#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Seekable buffer over a live HTTP byte-range stream.
//!
//! A [`LiveStream`] pulls bytes from a remote source into a fixed-size ring
//! buffer on a background transfer thread while the caller reads from the
//! front of the ring. Positions are server-absolute: the stream tracks where
//! the current transfer started, how far it has written, and how far the
//! caller has read, so a seek can be answered from the buffered window
//! without touching the network when possible, and by restarting the
//! transfer with a new `Range` when not.
//!
//! The data plane lives in the [`buffer`] crate; the network side is
//! abstracted behind the [`transport`] crate's [`Transport`] trait so tests
//! (and alternative sources) can drive the stream without sockets.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use livestream::LiveStream;
//!
//! # fn main() -> Result<(), livestream::StreamError> {
//! let stream = LiveStream::new(4 << 20);
//! stream.start("http://example.com/channel.ts")?;
//!
//! let mut chunk = vec![0u8; 64 * 1024];
//! let n = stream.read(&mut chunk, Duration::from_millis(500))?;
//! println!("got {n} bytes at offset {}", stream.position() - n as u64);
//!
//! stream.stop();
//! # Ok(())
//! # }
//! ```

mod error;
mod gate;
mod header;
mod stream;

pub use crate::error::StreamError;
pub use crate::stream::LiveStream;

// Re-exported so callers can configure or substitute the transport without
// naming the crate separately.
pub use transport::{HttpTransport, HttpTransportConfig, TransferOutcome, Transport};
