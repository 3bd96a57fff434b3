//! Configuration section for the CKAN provider.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CkanConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the CKAN API, e.g. `https://data.example.gov`.
    pub base_url: String,

    /// Public portal URL used in links shown to users.
    pub portal_url: String,

    /// Display name of the city or organization.
    pub city_name: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_timeout() -> u64 {
    120
}

impl CkanConfig {
    /// Parse and validate a provider section. URLs lose their trailing `/`.
    pub fn from_value(section: Value) -> Result<Self> {
        let mut config: CkanConfig =
            serde_json::from_value(section).context("invalid CKAN configuration")?;

        config.base_url = validate_url("base_url", &config.base_url)?;
        config.portal_url = validate_url("portal_url", &config.portal_url)?;

        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&config.timeout) {
            bail!(
                "timeout must be between {} and {} seconds, got {}",
                MIN_TIMEOUT_SECS,
                MAX_TIMEOUT_SECS,
                config.timeout
            );
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn validate_url(field: &str, value: &str) -> Result<String> {
    if value.trim().is_empty() {
        bail!("{} cannot be empty", field);
    }

    let url = Url::parse(value).with_context(|| format!("{} is not a valid URL", field))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("{} scheme must be http or https", field);
    }
    if url.host_str().map_or(true, str::is_empty) {
        bail!("{} must include a hostname", field);
    }

    Ok(value.trim_end_matches('/').to_string())
}
