#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use courier_client::{Client, ConnectionState};
use courier_fabric::codec::{decode_push_frame, ErrorResponse, PushFrame, Status};
use courier_fabric::transport::Connector;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

pub use courier_fabric::testing::Pki;

pub const WAIT: Duration = Duration::from_secs(5);

/// What the loopback gateway observed
#[derive(Debug)]
pub enum GatewayEvent {
    Frame { connection: usize, frame: PushFrame },
    Closed { connection: usize },
}

/// How the loopback gateway treats incoming frames
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Answer this identifier with an error response, then hang up
    pub reject: Option<(u32, Status)>,
    /// Hang up after this many frames on a connection
    pub hang_up_after: Option<usize>,
    /// Drop this many connections right after accepting them
    pub drop_first: usize,
}

/// Loopback push gateway, plain TCP or TLS
pub struct Gateway {
    pub addr: String,
    events: mpsc::UnboundedReceiver<GatewayEvent>,
    accepted: Arc<AtomicUsize>,
}

impl Gateway {
    pub async fn start(behavior: Behavior) -> Self {
        Self::spawn(behavior, None).await
    }

    pub async fn start_tls(behavior: Behavior, acceptor: TlsAcceptor) -> Self {
        Self::spawn(behavior, Some(acceptor)).await
    }

    async fn spawn(behavior: Behavior, acceptor: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, events) = mpsc::unbounded_channel();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();

        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let connection = counter.fetch_add(1, Ordering::SeqCst);
                if connection < behavior.drop_first {
                    drop(tcp);
                    continue;
                }

                let behavior = behavior.clone();
                let tx = tx.clone();
                match acceptor.clone() {
                    None => {
                        tokio::spawn(serve_connection(tcp, connection, behavior, tx));
                    }
                    Some(acceptor) => {
                        tokio::spawn(async move {
                            if let Ok(stream) = acceptor.accept(tcp).await {
                                serve_connection(stream, connection, behavior, tx).await;
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            events,
            accepted,
        }
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub async fn next_event(&mut self) -> GatewayEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("gateway event timed out")
            .expect("gateway stopped")
    }

    /// Next frame, skipping closures
    pub async fn next_frame(&mut self) -> (usize, PushFrame) {
        loop {
            if let GatewayEvent::Frame { connection, frame } = self.next_event().await {
                return (connection, frame);
            }
        }
    }

    /// Wait until `connection` has been closed by either side
    ///
    /// Frames received on the way are discarded; read them first if they
    /// matter.
    pub async fn closed(&mut self, connection: usize) {
        loop {
            if let GatewayEvent::Closed { connection: closed } = self.next_event().await {
                if closed == connection {
                    return;
                }
            }
        }
    }
}

async fn serve_connection<S>(
    mut stream: S,
    connection: usize,
    behavior: Behavior,
    tx: mpsc::UnboundedSender<GatewayEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut frames = 0;

    while let Ok(Some(frame)) = read_push_frame(&mut stream).await {
        frames += 1;
        let identifier = frame.identifier;
        let _ = tx.send(GatewayEvent::Frame { connection, frame });

        if let Some((rejected, status)) = behavior.reject {
            if rejected == identifier {
                let response = ErrorResponse::new(status, identifier);
                let _ = stream.write_all(&response.encode()).await;
                break;
            }
        }

        if behavior.hang_up_after == Some(frames) {
            break;
        }
    }

    let _ = stream.shutdown().await;
    drop(stream);
    let _ = tx.send(GatewayEvent::Closed { connection });
}

/// Read one push frame, `None` on clean end of stream
async fn read_push_frame<S: AsyncRead + Unpin>(stream: &mut S) -> io::Result<Option<PushFrame>> {
    let mut bytes = vec![0u8; 11];
    match stream.read_exact(&mut bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let token_len = u16::from_be_bytes([bytes[9], bytes[10]]) as usize;
    let mut rest = vec![0u8; token_len + 2];
    stream.read_exact(&mut rest).await?;
    bytes.extend_from_slice(&rest);

    let payload_len = u16::from_be_bytes([rest[token_len], rest[token_len + 1]]) as usize;
    let mut payload = vec![0u8; payload_len];
    stream.read_exact(&mut payload).await?;
    bytes.extend_from_slice(&payload);

    decode_push_frame(&bytes)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

/// Connection bookkeeping shared with a [`CountingConnector`]
#[derive(Debug, Default)]
pub struct Counters {
    pub attempts: AtomicUsize,
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
}

/// Connector wrapper counting attempts and simultaneously open streams
pub struct CountingConnector<C> {
    inner: C,
    pub counters: Arc<Counters>,
}

impl<C> CountingConnector<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            counters: Arc::new(Counters::default()),
        }
    }
}

#[async_trait::async_trait]
impl<C: Connector> Connector for CountingConnector<C> {
    type Stream = Tracked<C::Stream>;

    async fn connect(&self) -> courier_fabric::Result<Self::Stream> {
        self.counters.attempts.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.connect().await?;

        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(Tracked {
            inner,
            counters: self.counters.clone(),
        })
    }

    fn address(&self) -> &str {
        self.inner.address()
    }
}

/// Stream that counts itself live until dropped
pub struct Tracked<S> {
    inner: S,
    counters: Arc<Counters>,
}

impl<S> Drop for Tracked<S> {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Tracked<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Tracked<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Wait until the client reports `state`
pub async fn wait_for_state(client: &Client, state: ConnectionState) {
    let mut changes = client.state_changes();
    tokio::time::timeout(WAIT, changes.wait_for(|current| *current == state))
        .await
        .expect("state change timed out")
        .expect("connection owner stopped");
}
