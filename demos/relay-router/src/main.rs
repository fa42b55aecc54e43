//! Relay router front door.
//!
//! Usage: `relay-router [settings.json]` (defaults to `relay-router.json`).
//! Set `RUST_LOG` to change verbosity.

use relaygate::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_SETTINGS: &str = "relay-router.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SETTINGS.to_string());
    let settings = RouterSettings::load(&path)?;
    tracing::info!(%path, users = settings.users.len(), "settings loaded");

    let server = RelaygateServer::builder().settings(settings).build().await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
