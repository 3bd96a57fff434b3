// Redaction of request data before it reaches the logs

use std::collections::BTreeMap;

pub const REDACTED: &str = "[REDACTED]";

/// Longest body excerpt written to the logs, in characters.
pub const MAX_LOGGED_BODY: usize = 1000;

const SENSITIVE_HEADER_PARTS: &[&str] = &[
    "authorization",
    "cookie",
    "api-key",
    "api_key",
    "apikey",
    "token",
    "secret",
    "password",
    "credential",
    "session",
];

pub fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SENSITIVE_HEADER_PARTS.iter().any(|part| name.contains(part))
}

/// Copy of `headers` with sensitive values replaced by [`REDACTED`].
pub fn redact_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name) {
                REDACTED.to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_LOGGED_BODY) {
        Some((cut, _)) => format!("{}... [truncated]", &body[..cut]),
        None => body.to_string(),
    }
}
