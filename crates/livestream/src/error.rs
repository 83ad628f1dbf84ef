//! Error surface of the stream control API.
//!
//! Backpressure and read timeouts are not errors: a paused transfer resumes
//! internally, and a read that sees no data within its deadline returns
//! `Ok(0)`. Everything that does surface here is either caller misuse
//! (arguments, lifecycle) or a transport-level failure with the transport's
//! own error text attached.

use thiserror::Error;
use transport::TransportError;

/// Errors returned by [`LiveStream`](crate::LiveStream) operations.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// `start` was called while a transfer is already active.
    #[error("data transfer is already active")]
    AlreadyActive,

    /// The operation requires an active transfer.
    #[error("cannot {operation} an inactive data transfer")]
    NotActive {
        /// The rejected operation, for the error message.
        operation: &'static str,
    },

    /// The transport session could not be set up.
    #[error("transport setup failed: {0}")]
    Setup(#[from] TransportError),

    /// The transfer failed before producing any data. Carries the
    /// transport's error text verbatim.
    #[error("failed to start transfer: {message}")]
    TransferFailed {
        /// Transport error text.
        message: String,
    },

    /// The transfer could not be restarted at the requested position after
    /// an out-of-buffer seek. The session is still alive; the caller may
    /// seek again or stop.
    #[error("failed to restart transfer at position {position}: {message}")]
    SeekFailed {
        /// The seek target.
        position: u64,
        /// Transport error text.
        message: String,
    },

    /// The transport rejected the new range mid-seek. The session has been
    /// destroyed and the stream is idle; the caller must `start` again.
    #[error("transport reconfiguration failed at position {position}: {message}; transfer stopped")]
    SeekFatal {
        /// The seek target.
        position: u64,
        /// Transport error text.
        message: String,
    },
}
