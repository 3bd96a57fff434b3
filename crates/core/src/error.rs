// Error types for configuration and provider loading

use std::path::PathBuf;

/// Configuration problems. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No provider entry carries `enabled = true`.
    #[error(
        "No providers enabled. Set `enabled = true` for exactly one provider under [plugins]{}",
        available_hint(.available)
    )]
    NoProviderEnabled { available: Vec<String> },

    /// More than one provider entry carries `enabled = true`.
    #[error(
        "Multiple providers enabled ({}): {}. Only one provider may be active per server; \
         deploy a separate server for each provider",
        .enabled.len(),
        quoted(.enabled)
    )]
    MultipleProvidersEnabled { enabled: Vec<String> },

    #[error("Configuration missing 'plugins' section")]
    MissingPlugins,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Failures surfaced by the provider registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Discovery, instantiation or activation failed. `reason` holds the
    /// rendered cause chain.
    #[error("Failed to load provider '{provider}': {reason}")]
    Load { provider: String, reason: String },

    #[error("Provider registry not initialized. Call load() first")]
    NotInitialized,

    #[error("Tool '{name}' not found. Available tools: {}", .available.join(", "))]
    ToolNotFound { name: String, available: Vec<String> },

    #[error("Provider '{0}' not loaded")]
    ProviderMissing(String),
}

impl RegistryError {
    pub fn load(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{}\"", n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn available_hint(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(" (configured: {})", quoted(available))
    }
}
