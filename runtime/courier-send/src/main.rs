//! Command-line sender: pushes one notification and reports what the
//! gateway says about it.

mod config;

use anyhow::Context;
use courier_client::Client;
use courier_fabric::transport::TlsIdentity;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, IdentityConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    init_tracing();

    let identity = load_identity(&config.identity).await?;
    let client_config = config.client_config();
    let address = client_config.address.clone();
    let client = Client::new(&identity, client_config).context("failed to set up client")?;

    // Subscribe before sending so no response can be missed
    let mut errors = client.errors();

    let notification = config.notification.build()?;
    let identifier = client
        .submit(notification)
        .await
        .with_context(|| format!("failed to send to {address}"))?;
    tracing::info!(identifier, address = %address, "notification sent");

    let grace = tokio::time::sleep(config.grace_period());
    tokio::pin!(grace);

    let mut rejected = None;
    loop {
        tokio::select! {
            () = &mut grace => break,
            event = errors.recv() => {
                let Some(event) = event else { break };
                match event.response() {
                    Some(response) => {
                        tracing::error!(
                            status = %response.status,
                            identifier = response.identifier,
                            "gateway rejected notification"
                        );
                        if response.identifier == identifier {
                            rejected = Some(response.status);
                        }
                    }
                    None => tracing::warn!(event = %event, "connection event"),
                }
                if event.is_connection_lost() {
                    break;
                }
            }
        }
    }

    client.close().await.context("failed to close connection")?;

    match rejected {
        Some(status) => anyhow::bail!("notification {identifier} rejected: {status}"),
        None => Ok(()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn load_identity(config: &IdentityConfig) -> anyhow::Result<TlsIdentity> {
    let cert = tokio::fs::read(&config.cert)
        .await
        .with_context(|| format!("failed to read certificate {}", config.cert.display()))?;
    let key = tokio::fs::read(&config.key)
        .await
        .with_context(|| format!("failed to read private key {}", config.key.display()))?;

    let mut builder = TlsIdentity::builder()
        .client_cert_pem(cert)
        .client_key_pem(key);
    if let Some(ca) = &config.ca {
        let ca_pem = tokio::fs::read(ca)
            .await
            .with_context(|| format!("failed to read CA certificates {}", ca.display()))?;
        builder = builder.ca_cert_pem(ca_pem);
    }

    builder.build().context("invalid TLS identity")
}
