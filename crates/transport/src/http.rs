//! Blocking HTTP byte-range transport.
//!
//! One [`HttpTransport`] session corresponds to one remote URL. Each
//! [`perform`](crate::Transport::perform) call issues a single GET, adding a
//! `Range: bytes=<start>-` header once a range has been configured, and
//! pulls the body in bounded chunks, pushing them through the sink with the
//! pause/re-deliver discipline described on the crate root.

use std::io::Read;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::RANGE;
use reqwest::{StatusCode, Url};
use tracing::{debug, trace};

use crate::{SinkAction, StreamSink, TickAction, TransferOutcome, Transport, TransportError};

/// Tuning knobs for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Time allowed for the TCP/TLS connection to come up.
    pub connect_timeout: Duration,
    /// Sleep between sink ticks while the transfer is paused.
    pub tick_interval: Duration,
    /// Upper bound on the chunk size offered to the sink. Clamped to
    /// [`buffer::WRITE_PADDING`] so a refused chunk always fits in the ring
    /// once the consumer drains.
    pub read_chunk: usize,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            tick_interval: Duration::from_millis(50),
            read_chunk: buffer::WRITE_PADDING,
            user_agent: concat!("livestream/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

/// [`Transport`] implementation over `reqwest`'s blocking client.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    url: Url,
    range_start: Option<u64>,
    tick_interval: Duration,
    read_chunk: usize,
}

impl HttpTransport {
    /// Creates a session for `url` with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] for an unparsable URL and
    /// [`TransportError::Client`] when the HTTP client cannot be built.
    pub fn new(url: &str) -> Result<Self, TransportError> {
        Self::with_config(url, HttpTransportConfig::default())
    }

    /// Creates a session for `url` with explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`HttpTransport::new`].
    pub fn with_config(url: &str, config: HttpTransportConfig) -> Result<Self, TransportError> {
        let url = Url::parse(url).map_err(|err| TransportError::InvalidUrl {
            url: url.to_owned(),
            message: err.to_string(),
        })?;

        // No overall request timeout: a live stream stays open indefinitely.
        // Cancellation happens through the sink's progress ticks instead.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(None::<Duration>)
            .user_agent(config.user_agent)
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;

        Ok(Self {
            client,
            url,
            range_start: None,
            tick_interval: config.tick_interval,
            read_chunk: config.read_chunk.clamp(1, buffer::WRITE_PADDING),
        })
    }

    fn send_request(&self) -> Result<Response, String> {
        let mut request = self.client.get(self.url.clone());
        if let Some(start) = self.range_start {
            request = request.header(RANGE, format!("bytes={start}-"));
        }

        let response = request.send().map_err(|err| err.to_string())?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(format!("the requested url returned error: {status}"));
        }
        // 2xx is what a byte-range GET should produce; redirects are
        // followed inside the client.
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            debug!(status = %status, url = %self.url, "unexpected success status");
        }

        Ok(response)
    }

    fn deliver_headers(response: &Response, sink: &dyn StreamSink) {
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes());
            sink.on_header(&format!("{name}: {value}"));
        }
    }
}

impl Transport for HttpTransport {
    fn set_range(&mut self, start: u64) -> Result<(), TransportError> {
        self.range_start = Some(start);
        Ok(())
    }

    fn perform(&mut self, sink: &dyn StreamSink) -> TransferOutcome {
        let mut response = match self.send_request() {
            Ok(response) => response,
            Err(message) => return TransferOutcome::Failed(message),
        };

        debug!(url = %self.url, range_start = ?self.range_start, "transfer started");
        Self::deliver_headers(&response, sink);

        let mut chunk = vec![0u8; self.read_chunk];
        // Length of a chunk the sink refused and we still owe it.
        let mut pending: Option<usize> = None;

        loop {
            match sink.on_tick() {
                TickAction::Abort => {
                    debug!(url = %self.url, "transfer aborted by sink");
                    return TransferOutcome::Aborted;
                }
                TickAction::Resume | TickAction::Continue => {}
            }

            if let Some(len) = pending {
                match sink.on_data(&chunk[..len]) {
                    SinkAction::Consumed => pending = None,
                    SinkAction::Pause => thread::sleep(self.tick_interval),
                }
                continue;
            }

            let n = match response.read(&mut chunk) {
                Ok(0) => {
                    debug!(url = %self.url, "transfer completed");
                    return TransferOutcome::Completed;
                }
                Ok(n) => n,
                Err(err) => return TransferOutcome::Failed(err.to_string()),
            };

            match sink.on_data(&chunk[..n]) {
                SinkAction::Consumed => {}
                SinkAction::Pause => {
                    trace!(len = n, "sink refused chunk, pausing");
                    pending = Some(n);
                    thread::sleep(self.tick_interval);
                }
            }
        }
    }
}
