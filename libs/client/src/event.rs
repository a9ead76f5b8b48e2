//! Asynchronous error events published by the client

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use courier_fabric::codec::{decode_error_frame, ErrorResponse, Status};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

/// One occurrence on the error stream
///
/// Either a response frame sent by the server, a transport failure seen by
/// the connection (read failure, closure by the server, failed close), or
/// both when a read returned bytes and an error together.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    raw: Bytes,
    response: Option<ErrorResponse>,
    error: Option<Arc<io::Error>>,
}

impl ErrorEvent {
    /// Event for the outcome of one read off the connection
    pub(crate) fn from_read(bytes: &[u8], error: Option<io::Error>) -> Self {
        Self {
            raw: Bytes::copy_from_slice(bytes),
            response: decode_error_frame(bytes),
            error: error.map(Arc::new),
        }
    }

    /// Event carrying only a transport failure
    pub(crate) fn from_error(error: io::Error) -> Self {
        Self {
            raw: Bytes::new(),
            response: None,
            error: Some(Arc::new(error)),
        }
    }

    /// Bytes as read off the connection (0 to 6)
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Parsed response frame, if a complete one was read
    pub fn response(&self) -> Option<&ErrorResponse> {
        self.response.as_ref()
    }

    pub fn status(&self) -> Option<Status> {
        self.response.map(|response| response.status)
    }

    /// Identifier of the push frame the server is reporting on
    pub fn identifier(&self) -> Option<u32> {
        self.response.map(|response| response.identifier)
    }

    /// Underlying transport failure, if any
    pub fn transport_error(&self) -> Option<&io::Error> {
        self.error.as_deref()
    }

    /// Whether this event ended the connection it was read from
    pub fn is_connection_lost(&self) -> bool {
        self.error.is_some()
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.response, &self.error) {
            (Some(response), Some(error)) => write!(f, "{} ({})", response, error),
            (Some(response), None) => write!(f, "{}", response),
            (None, Some(error)) => write!(f, "transport error: {}", error),
            (None, None) => write!(f, "unparsed response {:02x?}", self.raw.as_ref()),
        }
    }
}

/// Subscription to a client's error events
///
/// Only events published after subscribing are seen. A subscriber that falls
/// more than the configured capacity behind loses the oldest events.
#[derive(Debug)]
pub struct ErrorStream {
    rx: broadcast::Receiver<ErrorEvent>,
}

impl ErrorStream {
    pub(crate) fn new(rx: broadcast::Receiver<ErrorEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the client and its connection owner are gone.
    pub async fn recv(&mut self) -> Option<ErrorEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "error stream subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already waiting
    pub fn try_recv(&mut self) -> Option<ErrorEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "error stream subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Adapt into a [`Stream`], skipping over lag gaps
    pub fn into_stream(self) -> impl Stream<Item = ErrorEvent> + Send + Unpin {
        BroadcastStream::new(self.rx).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::warn!(error = %err, "error stream subscriber lagged, events dropped");
                None
            }
        })
    }
}
