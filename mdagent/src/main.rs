//! Agent process entry point.

use anyhow::Context;
use mdagent::{AgentConfig, build_agent, run_session};
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mdagent=info,mdchat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AgentConfig::from_env().context("failed to load configuration")?;
    let agent = build_agent(&config)
        .await
        .with_context(|| format!("failed to start agent against {}", config.registry_url))?;

    let summary = run_session(&agent, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("terminal session failed")?;
    tracing::info!(
        turns = summary.turns,
        failed_turns = summary.failed_turns,
        "session ended"
    );

    Ok(())
}
