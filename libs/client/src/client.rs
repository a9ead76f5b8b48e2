use courier_core::Notification;
use courier_fabric::transport::{Connector, TlsIdentity};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::Instrument;

use crate::config::ClientConfig;
use crate::error::{Result, SendError};
use crate::event::{ErrorEvent, ErrorStream};
use crate::owner::{Command, ConnectionState, Owner};

/// Handle to a persistent push connection
///
/// Cheap to clone; every clone feeds the same connection owner task. The
/// owner stops, closing any live connection, once the last clone is dropped.
/// Constructing a client spawns that task, so it must happen inside a Tokio
/// runtime.
#[derive(Debug, Clone)]
pub struct Client {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<ErrorEvent>,
    state: watch::Receiver<ConnectionState>,
}

impl Client {
    /// Client for the TLS gateway described by `config`
    ///
    /// Fails only if the connector cannot be built from the identity and
    /// configuration; no connection is opened until the first submit.
    pub fn new(identity: &TlsIdentity, config: ClientConfig) -> Result<Self> {
        let connector = config.tls_connector(identity).map_err(SendError::Identity)?;
        Ok(Self::with_connector(connector, &config))
    }

    /// Client authenticating with a PEM certificate chain and private key
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8], config: ClientConfig) -> Result<Self> {
        let identity = TlsIdentity::from_pem(cert_pem, key_pem).map_err(SendError::Identity)?;
        Self::new(&identity, config)
    }

    /// Client opening its connections through `connector`
    pub fn with_connector<C: Connector>(connector: C, config: &ClientConfig) -> Self {
        let (commands, commands_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (state_tx, state) = watch::channel(ConnectionState::Idle);

        let span = tracing::info_span!("connection_owner", address = %connector.address());
        let owner = Owner::new(
            connector,
            commands_rx,
            events.clone(),
            state_tx,
            config.idle_timeout,
            config.write_timeout,
        );
        tokio::spawn(owner.run().instrument(span));

        Self {
            commands,
            events,
            state,
        }
    }

    /// Send one notification over the shared connection
    ///
    /// Waits until the connection owner has written the frame and returns
    /// the identifier assigned to it. Opens a connection first if none is
    /// live; a failed connect is returned as [`SendError::Connect`] and is
    /// not retried. Success means the frame was accepted by the transport,
    /// nothing more: the server reports rejections later, on the error
    /// stream, keyed by this identifier.
    ///
    /// Requests are served in the order they are queued. Dropping the
    /// returned future does not withdraw a queued request.
    pub async fn submit(&self, notification: Notification) -> Result<u32> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send {
                notification,
                reply,
            })
            .await
            .map_err(|_| SendError::Shutdown)?;
        rx.await.map_err(|_| SendError::Shutdown)?
    }

    /// Close the live connection, if any
    ///
    /// Closing an idle client succeeds and does nothing. The next submit
    /// connects again.
    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Close { reply })
            .await
            .map_err(|_| SendError::Shutdown)?;
        rx.await.map_err(|_| SendError::Shutdown)?
    }

    /// Subscribe to error events published from now on
    ///
    /// Events are not tied to any particular submit: a response frame
    /// carries the identifier of the push it refers to, which need not be
    /// the latest one, and many pushes never produce an event.
    pub fn errors(&self) -> ErrorStream {
        ErrorStream::new(self.events.subscribe())
    }

    /// Current state of the connection owner
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}
