//! Mutually authenticated TLS transport

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::error::{Error, Result};
use crate::transport::{host_of, Connector, TcpConnector};

/// Default timeout for TCP connection establishment
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the TLS handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Client identity and trust anchors for the encrypted transport
///
/// Built once; every connection opened from it shares the same
/// `rustls::ClientConfig`.
#[derive(Clone)]
pub struct TlsIdentity {
    client_config: Arc<ClientConfig>,
}

impl TlsIdentity {
    /// Create a builder for the identity
    pub fn builder() -> TlsIdentityBuilder {
        TlsIdentityBuilder::new()
    }

    /// Identity from a PEM certificate chain and PEM private key, trusting
    /// the bundled web PKI roots
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        Self::builder()
            .client_cert_pem(cert_pem)
            .client_key_pem(key_pem)
            .build()
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsIdentity").finish_non_exhaustive()
    }
}

/// Builder for [`TlsIdentity`]
#[derive(Default)]
pub struct TlsIdentityBuilder {
    client_cert_pem: Option<Vec<u8>>,
    client_key_pem: Option<Vec<u8>>,
    ca_cert_pem: Option<Vec<u8>>,
}

impl TlsIdentityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client certificate chain (PEM)
    pub fn client_cert_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.client_cert_pem = Some(pem.into());
        self
    }

    /// Set the client private key (PEM)
    pub fn client_key_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.client_key_pem = Some(pem.into());
        self
    }

    /// Trust only these CA certificates instead of the web PKI roots
    pub fn ca_cert_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.ca_cert_pem = Some(pem.into());
        self
    }

    /// Validate the certificate material and build the client config
    pub fn build(self) -> Result<TlsIdentity> {
        let cert_pem = self
            .client_cert_pem
            .ok_or_else(|| Error::TlsConfig("client certificate required".into()))?;
        let key_pem = self
            .client_key_pem
            .ok_or_else(|| Error::TlsConfig("client private key required".into()))?;

        let roots = match self.ca_cert_pem {
            Some(ca_pem) => {
                let ca_certs = parse_certificates(&ca_pem)?;
                if ca_certs.is_empty() {
                    return Err(Error::TlsConfig("no CA certificates found".into()));
                }
                let mut store = RootCertStore::empty();
                for cert in ca_certs {
                    store.add(cert).map_err(|e| {
                        Error::TlsConfig(format!("failed to add CA certificate: {e}"))
                    })?;
                }
                store
            }
            None => RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            },
        };

        let certs = parse_certificates(&cert_pem)?;
        if certs.is_empty() {
            return Err(Error::TlsConfig("no client certificates found".into()));
        }
        let key = PrivateKeyDer::from_pem_slice(&key_pem)
            .map_err(|e| Error::TlsConfig(format!("failed to parse private key: {e}")))?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let client_config = client_config(provider, roots, certs, key)?;

        Ok(TlsIdentity {
            client_config: Arc::new(client_config),
        })
    }
}

fn client_config(
    provider: Arc<CryptoProvider>,
    roots: RootCertStore,
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ClientConfig> {
    ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::TlsConfig(format!("protocol versions: {e}")))?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| Error::TlsConfig(format!("client config error: {e}")))
}

fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::TlsConfig(format!("failed to parse certificates: {e}")))
}

/// TLS connector: TCP dial followed by a mutually authenticated handshake
#[derive(Clone)]
pub struct TlsConnector {
    tcp: TcpConnector,
    server_name: ServerName<'static>,
    connector: tokio_rustls::TlsConnector,
    handshake_timeout: Duration,
}

impl TlsConnector {
    /// Connector for `address` with default timeouts, verifying the server
    /// against the host part of the address
    pub fn new(identity: &TlsIdentity, address: impl Into<String>) -> Result<Self> {
        Self::builder().identity(identity).address(address).build()
    }

    pub fn builder() -> TlsConnectorBuilder {
        TlsConnectorBuilder::default()
    }

    pub fn server_name(&self) -> &ServerName<'static> {
        &self.server_name
    }
}

impl fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnector")
            .field("tcp", &self.tcp)
            .field("server_name", &self.server_name)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Connector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    async fn connect(&self) -> Result<Self::Stream> {
        let tcp_stream = self.tcp.dial().await?;

        let stream = tokio::time::timeout(
            self.handshake_timeout,
            self.connector.connect(self.server_name.clone(), tcp_stream),
        )
        .await
        .map_err(|_| Error::Timeout {
            operation: "TLS handshake",
        })?
        .map_err(|e| Error::Handshake(e.to_string()))?;

        tracing::debug!(address = %self.tcp.address(), "tls handshake complete");
        Ok(stream)
    }

    fn address(&self) -> &str {
        self.tcp.address()
    }
}

/// Builder for configuring a TLS connector
#[derive(Default)]
pub struct TlsConnectorBuilder {
    identity: Option<TlsIdentity>,
    address: Option<String>,
    server_name: Option<String>,
    connect_timeout: Option<Duration>,
    handshake_timeout: Option<Duration>,
}

impl TlsConnectorBuilder {
    pub fn identity(mut self, identity: &TlsIdentity) -> Self {
        self.identity = Some(identity.clone());
        self
    }

    /// Set the `host:port` to connect to
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Name to verify the server certificate against, if not the host
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<TlsConnector> {
        let identity = self
            .identity
            .ok_or_else(|| Error::TlsConfig("identity not set".into()))?;
        let address = self.address.ok_or(Error::MissingAddress)?;

        let name = self
            .server_name
            .unwrap_or_else(|| host_of(&address).to_string());
        let server_name = ServerName::try_from(name)
            .map_err(|e| Error::TlsConfig(format!("invalid server name: {e}")))?;

        let tcp = TcpConnector::builder()
            .address(address)
            .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .build()?;

        Ok(TlsConnector {
            tcp,
            server_name,
            connector: tokio_rustls::TlsConnector::from(identity.client_config()),
            handshake_timeout: self.handshake_timeout.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT),
        })
    }
}
