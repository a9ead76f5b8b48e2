//! Courier Fabric - Wire codec and transport layer
//!
//! Provides the binary frame codec of the legacy push protocol and the
//! connectors (TLS with client certificates, plain TCP) that open
//! connections to a push gateway.
//!
//! # Example
//!
//! ```no_run
//! use courier_fabric::codec::{decode_error_frame, encode_push_frame};
//! use courier_fabric::transport::{Connector, TlsConnector, TlsIdentity};
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # async fn example(cert: &[u8], key: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let identity = TlsIdentity::from_pem(cert, key)?;
//! let connector = TlsConnector::new(&identity, courier_fabric::SANDBOX_GATEWAY)?;
//!
//! let mut stream = connector.connect().await?;
//! let frame = encode_push_frame(0, 0, &[0xab, 0x12], br#"{"aps":{}}"#)?;
//! stream.write_all(&frame).await?;
//!
//! let mut buf = [0u8; 6];
//! let n = stream.read(&mut buf).await?;
//! if let Some(response) = decode_error_frame(&buf[..n]) {
//!     println!("server rejected {}", response.identifier);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod transport;

#[cfg(feature = "test-util")]
pub mod testing;

// Re-exports for convenience
pub use error::{Error, Result};

/// Production gateway of the legacy binary interface
pub const PRODUCTION_GATEWAY: &str = "gateway.push.apple.com:2195";

/// Sandbox gateway of the legacy binary interface
pub const SANDBOX_GATEWAY: &str = "gateway.sandbox.push.apple.com:2195";
