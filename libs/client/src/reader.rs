//! Error reader: the read side of a live connection
//!
//! The server never answers a successful push. It only writes an
//! error-response frame, usually right before closing the connection, so the
//! read side is a loop that republishes whatever arrives and reports when the
//! connection is gone.

use std::io;

use courier_fabric::codec::ERROR_RESPONSE_SIZE;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::event::ErrorEvent;

/// Handle the connection owner keeps for the reader of its connection
#[derive(Debug)]
pub(crate) struct ReaderHandle {
    /// Resolves when the reader saw the connection fail or close
    pub(crate) lost: oneshot::Receiver<()>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReaderHandle {
    /// Stop the reader and wait until it has released the read half
    ///
    /// A reader stopped this way publishes nothing further.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "error reader task failed");
        }
    }
}

/// Spawn the reader for one connection
pub(crate) fn spawn_reader<R>(
    reader: R,
    events: broadcast::Sender<ErrorEvent>,
    connection: u64,
) -> ReaderHandle
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (lost_tx, lost) = oneshot::channel();
    let cancel = CancellationToken::new();

    let task = tokio::spawn(
        read_errors(reader, events, lost_tx, cancel.clone())
            .instrument(tracing::debug_span!("error_reader", connection)),
    );

    ReaderHandle { lost, cancel, task }
}

async fn read_errors<R>(
    mut reader: R,
    events: broadcast::Sender<ErrorEvent>,
    lost: oneshot::Sender<()>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; ERROR_RESPONSE_SIZE];

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("error reader stopped");
                return;
            }
            read = reader.read(&mut buf) => read,
        };

        let (len, error) = match read {
            Ok(0) => (
                0,
                Some(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )),
            ),
            Ok(len) => (len, None),
            Err(e) => (0, Some(e)),
        };

        let event = ErrorEvent::from_read(&buf[..len], error);
        let failed = event.is_connection_lost();

        match event.response() {
            Some(response) => tracing::warn!(
                status = %response.status,
                identifier = response.identifier,
                "server reported error"
            ),
            None if failed => tracing::info!(event = %event, "connection lost"),
            None => tracing::warn!(raw = ?event.raw(), "partial error response"),
        }

        // Nobody subscribed is fine
        let _ = events.send(event);

        if failed {
            let _ = lost.send(());
            return;
        }
    }
}
