mod analysis;
mod config;
mod handler;
mod platform;
mod retry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::handler::MessageHandler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,newsbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Analysis server: {}", config.analysis.base_url);
    info!("  Handler mode: {}", config.handler.mode);
    let retry = config.analysis.retry_policy();
    info!(
        "  Retry: {} attempt(s), {:?} apart",
        retry.max_attempts(),
        retry.delay()
    );
    info!("  Trigger: {:?}", config.handler.trigger);
    info!("  Allowed users: {:?}", config.telegram.allowed_user_ids);

    let handler = MessageHandler::from_config(&config)?;

    match handler.client().health().await {
        Ok(()) => info!("Analysis server is reachable"),
        Err(e) => warn!("Analysis server not reachable yet: {:#}", e),
    }

    info!("Bot is starting...");
    platform::telegram::run(Arc::new(config), Arc::new(handler)).await?;

    Ok(())
}
