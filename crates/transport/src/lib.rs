#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Transport capability surface for the live-stream buffer.
//!
//! The stream core needs exactly this much from an HTTP byte-range source:
//! configure where the next transfer starts, then run it synchronously while
//! the transport feeds response header lines, body chunks, and periodic
//! progress ticks into a [`StreamSink`]. The sink may refuse a chunk to
//! apply backpressure, in which case the transport must re-deliver the same
//! bytes once a later tick asks it to resume.
//!
//! [`HttpTransport`] implements the surface over a blocking HTTP client.
//! Because a pull-style client has no native pause primitive, the adapter
//! retains a refused chunk and re-offers it after resume, which preserves
//! the sink-side contract (a chunk is consumed whole or not at all).

mod http;
#[cfg(any(test, feature = "test-support"))]
mod scripted;

pub use crate::http::{HttpTransport, HttpTransportConfig};
#[cfg(any(test, feature = "test-support"))]
pub use crate::scripted::ScriptedTransport;

use thiserror::Error;

/// Disposition of a chunk offered to [`StreamSink::on_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkAction {
    /// The whole chunk was accepted.
    Consumed,
    /// Nothing was accepted; pause and re-deliver the same chunk after the
    /// next [`TickAction::Resume`].
    Pause,
}

/// Disposition returned by [`StreamSink::on_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Keep transferring.
    Continue,
    /// A previously paused transfer should resume delivery.
    Resume,
    /// Terminate the transfer; the run ends with
    /// [`TransferOutcome::Aborted`].
    Abort,
}

/// Final result of one transport run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The source delivered its entire response body.
    Completed,
    /// A progress tick requested termination.
    Aborted,
    /// The transfer ended with a transport-level error. The message is the
    /// transport's own error text, surfaced verbatim.
    Failed(String),
}

impl TransferOutcome {
    /// Returns `true` only for [`TransferOutcome::Failed`]; an abort
    /// requested through the sink is a normal shutdown, not a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Callbacks a transport drives synchronously on the thread running
/// [`Transport::perform`].
pub trait StreamSink: Send + Sync {
    /// Called once per response header with a `Name: value` line.
    fn on_header(&self, line: &str);

    /// Offers a body chunk. The implementation either consumes all of it or
    /// returns [`SinkAction::Pause`] having consumed none of it.
    fn on_data(&self, chunk: &[u8]) -> SinkAction;

    /// Called periodically throughout the transfer, including while paused.
    fn on_tick(&self) -> TickAction;
}

/// One HTTP byte-range session, reusable across restarts.
///
/// A session is bound to a URL at construction. Between runs the stream
/// control layer may move the start offset with
/// [`set_range`](Self::set_range); each [`perform`](Self::perform) call then
/// issues one transfer from that offset and runs it to completion, abort, or
/// failure.
pub trait Transport: Send {
    /// Reconfigures the next run to request `bytes=<start>-`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Configuration`] when the session cannot
    /// accept the new range; the caller must treat the session as unusable.
    fn set_range(&mut self, start: u64) -> Result<(), TransportError>;

    /// Runs one synchronous transfer against `sink`.
    fn perform(&mut self, sink: &dyn StreamSink) -> TransferOutcome;
}

/// Errors raised while configuring a transport session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The stream URL could not be parsed.
    #[error("invalid url {url:?}: {message}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Parser error text.
        message: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(String),

    /// The session rejected a reconfiguration request.
    #[error("transport reconfiguration rejected: {0}")]
    Configuration(String),
}
