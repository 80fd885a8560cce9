//! Boot — logging init and config load.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AgentConfig, ConfigError};

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load and validate configuration.
pub fn boot() -> Result<AgentConfig, ConfigError> {
    info!("Starting Linetail Agent v0.1.0");

    let config = AgentConfig::load()?;
    config.validate()?;
    info!(
        "Line handling: line_limit={}, multiline enabled={}, pattern={:?}, auto_detect={}",
        config.line_limit,
        config.multiline.enabled,
        config.multiline.pattern,
        config.multiline.auto_detect
    );

    Ok(config)
}
