use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::transport::Connector;

/// Plain TCP connector
///
/// Used for loopback gateways and TLS-terminating proxies; also the dialing
/// step of [`TlsConnector`](crate::transport::TlsConnector).
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    connect_timeout: Option<Duration>,
    nodelay: bool,
}

impl TcpConnector {
    /// Connector for `address` (`host:port`) with no timeout
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: None,
            nodelay: true,
        }
    }

    /// Create a builder for configuring the connector
    pub fn builder() -> TcpConnectorBuilder {
        TcpConnectorBuilder::new()
    }

    pub(crate) async fn dial(&self) -> Result<TcpStream> {
        let connect_op = TcpStream::connect(self.address.as_str());

        let stream = if let Some(timeout) = self.connect_timeout {
            tokio::time::timeout(timeout, connect_op)
                .await
                .map_err(|_| Error::Timeout { operation: "Connect" })??
        } else {
            connect_op.await?
        };

        stream.set_nodelay(self.nodelay)?;
        tracing::debug!(address = %self.address, "tcp connection established");
        Ok(stream)
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<TcpStream> {
        self.dial().await
    }

    fn address(&self) -> &str {
        &self.address
    }
}

/// Builder for configuring a TCP connector
#[derive(Debug)]
pub struct TcpConnectorBuilder {
    address: Option<String>,
    connect_timeout: Option<Duration>,
    nodelay: bool,
}

impl Default for TcpConnectorBuilder {
    fn default() -> Self {
        Self {
            address: None,
            connect_timeout: None,
            nodelay: true,
        }
    }
}

impl TcpConnectorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address to connect to
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Enable or disable `TCP_NODELAY` (enabled by default)
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Build the connector with the configured settings
    pub fn build(self) -> Result<TcpConnector> {
        let address = self.address.ok_or(Error::MissingAddress)?;

        Ok(TcpConnector {
            address,
            connect_timeout: self.connect_timeout,
            nodelay: self.nodelay,
        })
    }
}
