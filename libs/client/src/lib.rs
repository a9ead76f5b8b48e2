//! Courier Client - Persistent connection to a legacy push gateway
//!
//! A [`Client`] funnels notifications from any number of tasks onto one
//! long-lived connection. A single owner task holds the connection, opens it
//! on demand, closes it after an idle period or when it breaks, and never
//! retries on its own. Errors the server reports asynchronously arrive on an
//! [`ErrorStream`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use courier_client::{Client, ClientConfig};
//! use courier_core::{Notification, Payload};
//!
//! # async fn example(cert: &[u8], key: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new(courier_fabric::SANDBOX_GATEWAY)
//!     .with_idle_timeout(Duration::from_secs(60));
//! let client = Client::from_pem(cert, key, config)?;
//!
//! let mut errors = client.errors();
//! tokio::spawn(async move {
//!     while let Some(event) = errors.recv().await {
//!         eprintln!("push error: {event}");
//!     }
//! });
//!
//! let payload = Payload::new().alert("Hello").sound("default");
//! let notification = Notification::with_payload("ab12", 3600, &payload)?;
//! let identifier = client.submit(notification).await?;
//! println!("sent as {identifier}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod event;

mod owner;
mod reader;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{Result, SendError};
pub use event::{ErrorEvent, ErrorStream};
pub use owner::ConnectionState;
