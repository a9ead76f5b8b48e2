use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser};
use courier_client::ClientConfig;
use courier_core::{Notification, Payload};

#[derive(Clone, Debug, Parser)]
#[command(version, about = "Send one push notification over the binary gateway protocol", long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub identity: IdentityConfig,

    #[command(flatten)]
    pub gateway: GatewayConfig,

    #[command(flatten)]
    pub notification: NotificationConfig,

    /// How long to wait for error responses after sending, in milliseconds
    #[arg(long, env = "COURIER_GRACE_MS", default_value_t = 2000)]
    pub grace_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct IdentityConfig {
    /// PEM file holding the client certificate chain
    #[arg(long, env = "COURIER_CERT")]
    pub cert: PathBuf,

    /// PEM file holding the client private key
    #[arg(long, env = "COURIER_KEY")]
    pub key: PathBuf,

    /// PEM file with CA certificates to trust instead of the bundled roots
    #[arg(long, env = "COURIER_CA")]
    pub ca: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct GatewayConfig {
    /// Gateway address as host:port
    #[arg(long, env = "COURIER_ADDRESS", default_value = courier_fabric::PRODUCTION_GATEWAY)]
    pub address: String,

    /// Use the sandbox gateway; ignored when an address is given explicitly
    #[arg(long, env = "COURIER_SANDBOX", default_value_t = false)]
    pub sandbox: bool,

    /// Name to verify the gateway certificate against
    #[arg(long, env = "COURIER_SERVER_NAME")]
    pub server_name: Option<String>,

    /// TCP connect timeout in milliseconds
    #[arg(long, env = "COURIER_CONNECT_TIMEOUT_MS", default_value_t = 10_000)]
    pub connect_timeout_ms: u64,

    /// TLS handshake timeout in milliseconds
    #[arg(long, env = "COURIER_HANDSHAKE_TIMEOUT_MS", default_value_t = 10_000)]
    pub handshake_timeout_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct NotificationConfig {
    /// Device token, hex encoded
    #[arg(long, env = "COURIER_TOKEN")]
    pub token: String,

    /// Seconds until the gateway may discard the notification
    #[arg(long, env = "COURIER_EXPIRY", default_value_t = 3600)]
    pub expiry: u32,

    /// Raw JSON payload; replaces every other payload option
    #[arg(long, env = "COURIER_PAYLOAD")]
    pub payload: Option<String>,

    /// Alert text
    #[arg(long, env = "COURIER_ALERT")]
    pub alert: Option<String>,

    /// Badge number
    #[arg(long, env = "COURIER_BADGE")]
    pub badge: Option<u32>,

    /// Sound name
    #[arg(long, env = "COURIER_SOUND")]
    pub sound: Option<String>,

    /// Mark the notification as a background update
    #[arg(long, default_value_t = false)]
    pub content_available: bool,

    /// Custom top-level payload entries as key=value
    #[arg(long = "data", value_parser = parse_key_value)]
    pub data: Vec<(String, String)>,
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn client_config(&self) -> ClientConfig {
        let gateway = &self.gateway;
        let address = if gateway.sandbox && gateway.address == courier_fabric::PRODUCTION_GATEWAY {
            courier_fabric::SANDBOX_GATEWAY.to_string()
        } else {
            gateway.address.clone()
        };

        let mut config = ClientConfig::new(address)
            .with_connect_timeout(Duration::from_millis(gateway.connect_timeout_ms))
            .with_handshake_timeout(Duration::from_millis(gateway.handshake_timeout_ms));
        if let Some(name) = &gateway.server_name {
            config = config.with_server_name(name.clone());
        }
        config
    }
}

impl NotificationConfig {
    pub fn build(&self) -> anyhow::Result<Notification> {
        if let Some(raw) = &self.payload {
            serde_json::from_str::<serde_json::Value>(raw).context("payload is not valid JSON")?;
            return Ok(Notification::new(
                self.token.clone(),
                self.expiry,
                raw.clone().into_bytes(),
            ));
        }

        let mut payload = Payload::new();
        if let Some(alert) = &self.alert {
            payload = payload.alert(alert.clone());
        }
        if let Some(badge) = self.badge {
            payload = payload.badge(badge);
        }
        if let Some(sound) = &self.sound {
            payload = payload.sound(sound.clone());
        }
        if self.content_available {
            payload = payload.content_available();
        }
        for (key, value) in &self.data {
            payload = payload.custom(key.clone(), value.clone());
        }

        Ok(Notification::with_payload(
            self.token.clone(),
            self.expiry,
            &payload,
        )?)
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{s}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let base = ["courier-send", "--cert", "c.pem", "--key", "k.pem", "--token", "ab12"];
        Config::try_parse_from(base.iter().chain(args)).unwrap()
    }

    #[test]
    fn sandbox_switches_default_address() {
        let config = parse(&["--sandbox"]);
        assert_eq!(config.client_config().address, courier_fabric::SANDBOX_GATEWAY);

        let config = parse(&["--sandbox", "--address", "127.0.0.1:2195"]);
        assert_eq!(config.client_config().address, "127.0.0.1:2195");
    }

    #[test]
    fn builds_payload_from_options() {
        let config = parse(&["--alert", "Hi", "--badge", "3", "--data", "order=42"]);
        let notification = config.notification.build().unwrap();

        let json: serde_json::Value = serde_json::from_slice(notification.payload()).unwrap();
        assert_eq!(json["aps"]["alert"], "Hi");
        assert_eq!(json["aps"]["badge"], 3);
        assert_eq!(json["order"], "42");
        assert_eq!(notification.expire_after_seconds(), 3600);
    }

    #[test]
    fn raw_payload_must_be_json() {
        let config = parse(&["--payload", "{\"aps\":{}}"]);
        assert_eq!(config.notification.build().unwrap().payload().as_ref(), b"{\"aps\":{}}");

        let config = parse(&["--payload", "not json"]);
        assert!(config.notification.build().is_err());
    }

    #[test]
    fn rejects_malformed_data_pair() {
        let base = ["courier-send", "--cert", "c", "--key", "k", "--token", "ab", "--data", "oops"];
        assert!(Config::try_parse_from(base).is_err());
    }
}
