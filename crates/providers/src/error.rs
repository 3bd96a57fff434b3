//! Error types for outbound HTTP calls made by providers.

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (connect failure, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an error status or an unsuccessful payload.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

const MAX_ERROR_BODY: usize = 500;

impl TransportError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Build an API error from a status code and response body.
    ///
    /// Understands `{"error": {"message": ...}}`, `{"error": "..."}` and
    /// `{"message": "..."}` bodies; anything else is kept verbatim (truncated).
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|v| {
                v.pointer("/error/message")
                    .or_else(|| v.get("error"))
                    .or_else(|| v.get("message"))
            })
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY).collect());

        Self::Api { status, message }
    }
}
