use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

pub mod tcp;
pub mod tls;

pub use self::tcp::{TcpConnector, TcpConnectorBuilder};
pub use self::tls::{TlsConnector, TlsConnectorBuilder, TlsIdentity, TlsIdentityBuilder};

/// Connector trait for opening connections to the push gateway
///
/// Each call yields a fresh, fully established stream (dialed and, for
/// encrypted transports, past the handshake). Connectors never retry.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new connection
    async fn connect(&self) -> Result<Self::Stream>;

    /// Address this connector dials, for diagnostics
    fn address(&self) -> &str;
}

/// Split `host:port` into its host part, without IPv6 brackets
pub(crate) fn host_of(address: &str) -> &str {
    let host = address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(address);
    host.trim_start_matches('[').trim_end_matches(']')
}
