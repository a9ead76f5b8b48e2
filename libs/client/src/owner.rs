//! Connection owner: the single task that holds the connection
//!
//! ```text
//! submit ─┐                        ┌─► write half ──► gateway
//! submit ─┼─► request queue ─► Owner
//! close  ─┘                        └─► Error reader ◄── read half
//!                                         │
//!                                         └─► error stream
//! ```
//!
//! State moves `Idle → Connecting → Active → Idle`. While active the owner
//! waits on three things at once: the reader's connection-lost signal, the
//! idle timer and the next request. Only the owner ever decides which
//! connection is current, so the connection needs no lock.

use std::fmt;
use std::io;
use std::time::{Duration, SystemTime};

use courier_core::{Notification, PreparedNotification};
use courier_fabric::codec::encode_push_frame;
use courier_fabric::transport::Connector;
use tokio::io::{AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::error::{Result, SendError};
use crate::event::ErrorEvent;
use crate::reader::{spawn_reader, ReaderHandle};

/// Observable state of the connection owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection; the next send will open one
    Idle,
    /// Dialing and handshaking
    Connecting,
    /// Connection established and serving sends
    Active,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Active => "active",
        };
        f.write_str(name)
    }
}

/// Work handed to the owner through the request queue
#[derive(Debug)]
pub(crate) enum Command {
    Send {
        notification: Notification,
        reply: oneshot::Sender<Result<u32>>,
    },
    Close {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Why the owner left the active state
#[derive(Debug)]
enum Exit {
    IdleTimeout,
    ConnectionLost,
    WriteFailed,
    Closed(oneshot::Sender<Result<()>>),
    Shutdown,
}

impl Exit {
    /// Whether the connection can still be closed gracefully
    fn connection_open(&self) -> bool {
        !matches!(self, Exit::ConnectionLost | Exit::WriteFailed)
    }
}

struct Active<S> {
    writer: WriteHalf<S>,
    reader: ReaderHandle,
    connection: u64,
}

pub(crate) struct Owner<C: Connector> {
    connector: C,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<ErrorEvent>,
    state: watch::Sender<ConnectionState>,
    idle_timeout: Duration,
    write_timeout: Duration,
    next_identifier: u32,
    connections: u64,
}

impl<C: Connector> Owner<C> {
    pub(crate) fn new(
        connector: C,
        commands: mpsc::Receiver<Command>,
        events: broadcast::Sender<ErrorEvent>,
        state: watch::Sender<ConnectionState>,
        idle_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            commands,
            events,
            state,
            idle_timeout,
            write_timeout,
            next_identifier: 0,
            connections: 0,
        }
    }

    /// Serve requests until every client handle is dropped
    pub(crate) async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Close { reply } => {
                    // Nothing live while idle
                    let _ = reply.send(Ok(()));
                }
                Command::Send {
                    notification,
                    reply,
                } => {
                    let prepared = match notification.prepare() {
                        Ok(prepared) => prepared,
                        Err(e) => {
                            let _ = reply.send(Err(e.into()));
                            continue;
                        }
                    };

                    let mut active = match self.connect().await {
                        Ok(active) => active,
                        Err(e) => {
                            let _ = reply.send(Err(e));
                            continue;
                        }
                    };

                    let outcome = self.write(&mut active.writer, &prepared).await;
                    let failed = matches!(outcome, Err(SendError::Write { .. }));
                    let _ = reply.send(outcome);

                    if failed {
                        self.leave(active, Exit::WriteFailed).await;
                    } else {
                        self.serve(active).await;
                    }
                }
            }
        }

        tracing::debug!("request queue closed, connection owner exiting");
    }

    /// One connect attempt, no retry
    async fn connect(&mut self) -> Result<Active<C::Stream>> {
        self.set_state(ConnectionState::Connecting);
        let address = self.connector.address().to_string();

        let stream = match self.connector.connect().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "failed to connect");
                self.set_state(ConnectionState::Idle);
                return Err(SendError::Connect(e));
            }
        };

        self.connections += 1;
        let connection = self.connections;
        let (read_half, writer) = tokio::io::split(stream);
        let reader = spawn_reader(read_half, self.events.clone(), connection);

        tracing::info!(address = %address, connection, "connected");
        self.set_state(ConnectionState::Active);

        Ok(Active {
            writer,
            reader,
            connection,
        })
    }

    /// Multiplex requests, connection loss and the idle timer
    async fn serve(&mut self, mut active: Active<C::Stream>) {
        let idle = tokio::time::sleep(self.idle_timeout);
        tokio::pin!(idle);

        let exit = loop {
            tokio::select! {
                biased;
                _ = &mut active.reader.lost => break Exit::ConnectionLost,
                () = &mut idle => break Exit::IdleTimeout,
                command = self.commands.recv() => match command {
                    None => break Exit::Shutdown,
                    Some(Command::Close { reply }) => break Exit::Closed(reply),
                    Some(Command::Send { notification, reply }) => {
                        let prepared = match notification.prepare() {
                            Ok(prepared) => prepared,
                            Err(e) => {
                                let _ = reply.send(Err(e.into()));
                                continue;
                            }
                        };

                        match self.write(&mut active.writer, &prepared).await {
                            Ok(identifier) => {
                                let _ = reply.send(Ok(identifier));
                                idle.as_mut().reset(Instant::now() + self.idle_timeout);
                            }
                            Err(e @ SendError::Write { .. }) => {
                                let _ = reply.send(Err(e));
                                break Exit::WriteFailed;
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e));
                            }
                        }
                    }
                },
            }
        };

        self.leave(active, exit).await;
    }

    /// Frame and write one notification
    ///
    /// The identifier is consumed once the frame is built, whether or not
    /// the write succeeds.
    async fn write<W>(&mut self, writer: &mut W, notification: &PreparedNotification) -> Result<u32>
    where
        W: AsyncWrite + Unpin,
    {
        let identifier = self.next_identifier;
        let expiry = notification.expiry_at(SystemTime::now());

        let frame = encode_push_frame(
            identifier,
            expiry,
            notification.token(),
            notification.payload(),
        )
        .map_err(SendError::Encode)?;
        self.next_identifier = identifier.wrapping_add(1);

        let written = tokio::time::timeout(self.write_timeout, async {
            writer.write_all(&frame).await?;
            writer.flush().await
        })
        .await
        .unwrap_or_else(|_| Err(timed_out("write")));

        match written {
            Ok(()) => {
                tracing::debug!(identifier, bytes = frame.len(), "push frame written");
                Ok(identifier)
            }
            Err(source) => {
                tracing::warn!(identifier, error = %source, "failed to write push frame");
                Err(SendError::Write { identifier, source })
            }
        }
    }

    /// Tear the connection down and return to idle
    async fn leave(&mut self, active: Active<C::Stream>, exit: Exit) {
        let Active {
            mut writer,
            reader,
            connection,
        } = active;

        tracing::info!(connection, reason = ?exit, "closing connection");
        reader.stop().await;

        let closed = if exit.connection_open() {
            tokio::time::timeout(self.write_timeout, writer.shutdown())
                .await
                .unwrap_or_else(|_| Err(timed_out("close")))
        } else {
            Ok(())
        };
        drop(writer);
        self.set_state(ConnectionState::Idle);

        match exit {
            Exit::Closed(reply) => {
                let _ = reply.send(closed.map_err(SendError::Close));
            }
            _ => {
                if let Err(e) = closed {
                    self.publish_close_error(e);
                }
            }
        }
    }

    fn publish_close_error(&self, error: io::Error) {
        tracing::warn!(error = %error, "failed to close connection");
        let _ = self.events.send(ErrorEvent::from_error(error));
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "connection state changed");
        }
    }
}

fn timed_out(operation: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("{operation} timeout exceeded"),
    )
}
