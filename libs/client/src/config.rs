use std::time::Duration;

use courier_fabric::transport::{TlsConnector, TlsIdentity};
use courier_fabric::PRODUCTION_GATEWAY;
use serde::{Deserialize, Serialize};

/// Default idle time after which the connection is closed
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default bound on writing one frame or closing a connection
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the request queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default capacity of the error stream
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Client configuration
///
/// Durations are (de)serialized as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Gateway `host:port`
    pub address: String,

    /// Name to verify the server certificate against, defaults to the host
    pub server_name: Option<String>,

    #[serde(rename = "idle_timeout_ms", with = "millis")]
    pub idle_timeout: Duration,

    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,

    #[serde(rename = "handshake_timeout_ms", with = "millis")]
    pub handshake_timeout: Duration,

    /// Bound on writing one frame, and on the graceful close of a connection
    #[serde(rename = "write_timeout_ms", with = "millis")]
    pub write_timeout: Duration,

    /// Requests that may wait for the connection owner before callers block
    pub queue_capacity: usize,

    /// Error events retained for subscribers that fall behind
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: PRODUCTION_GATEWAY.to_string(),
            server_name: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connect_timeout: courier_fabric::transport::tls::DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: courier_fabric::transport::tls::DEFAULT_HANDSHAKE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Default configuration for the gateway at `address`
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Build the TLS connector described by this configuration
    pub fn tls_connector(&self, identity: &TlsIdentity) -> courier_fabric::Result<TlsConnector> {
        let mut builder = TlsConnector::builder()
            .identity(identity)
            .address(self.address.clone())
            .connect_timeout(self.connect_timeout)
            .handshake_timeout(self.handshake_timeout);

        if let Some(name) = &self.server_name {
            builder = builder.server_name(name.clone());
        }

        builder.build()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_production_gateway() {
        let config = ClientConfig::default();
        assert_eq!(config.address, "gateway.push.apple.com:2195");
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn deserializes_partial_config_with_millis() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"address":"127.0.0.1:2195","idle_timeout_ms":100,"server_name":"localhost"}"#,
        )
        .unwrap();

        assert_eq!(config.address, "127.0.0.1:2195");
        assert_eq!(config.idle_timeout, Duration::from_millis(100));
        assert_eq!(config.server_name.as_deref(), Some("localhost"));
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn serializes_durations_as_millis() {
        let config = ClientConfig::new("localhost:2195").with_idle_timeout(Duration::from_secs(2));
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(value["idle_timeout_ms"], 2000);
        assert_eq!(value["connect_timeout_ms"], 10_000);
        assert_eq!(value["write_timeout_ms"], 10_000);
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = ClientConfig::new("localhost:2195")
            .with_server_name("gateway")
            .with_connect_timeout(Duration::from_millis(5))
            .with_handshake_timeout(Duration::from_millis(6))
            .with_write_timeout(Duration::from_millis(7))
            .with_queue_capacity(1)
            .with_event_capacity(2);

        assert_eq!(config.server_name.as_deref(), Some("gateway"));
        assert_eq!(config.connect_timeout, Duration::from_millis(5));
        assert_eq!(config.handshake_timeout, Duration::from_millis(6));
        assert_eq!(config.write_timeout, Duration::from_millis(7));
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.event_capacity, 2);
    }
}
