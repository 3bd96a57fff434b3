// Application configuration and the single-active-provider rule

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable holding a JSON configuration document.
pub const CONFIG_ENV_VAR: &str = "OPENCONTEXT_CONFIG";

/// Where a resolved configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// The [`CONFIG_ENV_VAR`] JSON document.
    Inline,
    File(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => f.write_str(CONFIG_ENV_VAR),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Provider sections keyed by provider name. Each section is handed to
    /// the provider untouched, so it stays an untyped JSON value here.
    pub plugins: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Build a configuration from an already-parsed document.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let Some(root) = value.as_object() else {
            return Err(ConfigError::Invalid(
                "configuration must be a table/object".to_string(),
            ));
        };

        match root.get("plugins") {
            None => return Err(ConfigError::MissingPlugins),
            Some(Value::Object(_)) => {}
            Some(_) => {
                return Err(ConfigError::Invalid(
                    "'plugins' section must be a table/object".to_string(),
                ))
            }
        }

        serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let value: Value = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Load a configuration file. `.json` files are read as JSON, anything
    /// else as TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if content.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "configuration file {} is empty",
                path.display()
            )));
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Prefer an inline JSON document (normally from [`CONFIG_ENV_VAR`]),
    /// falling back to the file at `path`. Nothing is logged here; callers
    /// report the source once logging is set up.
    pub fn resolve(
        inline: Option<&str>,
        path: &Path,
    ) -> Result<(Self, ConfigSource), ConfigError> {
        match inline {
            Some(json) if !json.trim().is_empty() => {
                Ok((Self::from_json_str(json)?, ConfigSource::Inline))
            }
            _ => Ok((Self::load(path)?, ConfigSource::File(path.to_path_buf()))),
        }
    }

    /// Resolve using the process environment.
    pub fn from_env_or_file(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        let inline = std::env::var(CONFIG_ENV_VAR).ok();
        Self::resolve(inline.as_deref(), path)
    }

    /// Names of every provider section that is a table, enabled or not.
    pub fn provider_names(&self) -> Vec<String> {
        self.plugins
            .iter()
            .filter(|(_, section)| section.is_object())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of the provider sections with `enabled = true`.
    pub fn enabled_providers(&self) -> Vec<String> {
        self.plugins
            .iter()
            .filter(|(_, section)| is_enabled(section))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The one enabled provider and its section.
    ///
    /// Fails when zero or more than one section is enabled; the error names
    /// every enabled entry.
    pub fn enabled_provider(&self) -> Result<(&str, &Value), ConfigError> {
        let mut enabled = self
            .plugins
            .iter()
            .filter(|(_, section)| is_enabled(section));

        match (enabled.next(), enabled.next()) {
            (Some((name, section)), None) => Ok((name.as_str(), section)),
            (None, _) => Err(ConfigError::NoProviderEnabled {
                available: self.provider_names(),
            }),
            (Some(_), Some(_)) => Err(ConfigError::MultipleProvidersEnabled {
                enabled: self.enabled_providers(),
            }),
        }
    }
}

fn is_enabled(section: &Value) -> bool {
    section
        .get("enabled")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
