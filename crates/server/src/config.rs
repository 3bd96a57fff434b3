use anyhow::{Context, Result};
use opencontext_core::{AppConfig, ConfigSource, LogFormat, LoggingConfig};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Load configuration, preferring the `OPENCONTEXT_CONFIG` environment
/// variable over the file at `path`.
pub fn load(path: &Path) -> Result<(AppConfig, ConfigSource)> {
    AppConfig::from_env_or_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// Logs go to stderr so the stdio transport keeps stdout to itself.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid logging level '{}'", logging.level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}
