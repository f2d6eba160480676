//! Registry process entry point.

use std::sync::Arc;

use anyhow::Context;
use mdserver::{DataSources, RegistryState, ServerConfig, build_registry};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mdserver=info,mdtooling=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("failed to load configuration")?;
    let sources = DataSources::live(&config).context("failed to initialize data sources")?;
    let registry = build_registry(sources);
    tracing::info!(tools = registry.len(), "tool catalog ready");

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(address = %listener.local_addr()?, "registry listening on /mcp");

    mdserver::serve(listener, Arc::new(RegistryState::new(registry)), async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown requested"),
            Err(error) => {
                tracing::warn!(%error, "ctrl-c handler unavailable; serving until killed");
                std::future::pending::<()>().await;
            }
        }
    })
    .await
    .context("registry server failed")?;

    Ok(())
}
