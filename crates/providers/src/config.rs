//! Connection settings shared by the HTTP-backed providers.

use std::time::Duration;
use url::Url;

/// How an API key is presented to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: <key>`, as CKAN expects.
    Raw,
    /// `Authorization: Bearer <key>`.
    Bearer,
}

/// Settings for one [`HttpTransport`](crate::transport::HttpTransport).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL; request paths are appended to it.
    pub base_url: Url,
    /// API key sent on every request.
    pub api_key: Option<String>,
    pub auth_scheme: AuthScheme,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry_config: RetryConfig,
}

impl TransportConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_key: None,
            auth_scheme: AuthScheme::Bearer,
            timeout: Duration::from_secs(120),
            retry_config: RetryConfig::default(),
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// HTTP status codes that trigger a retry.
    pub retry_on_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            retry_on_status_codes: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff before retry number `attempt` (zero-based).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        std::cmp::min(backoff, self.max_backoff)
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status_codes.contains(&status)
    }
}
