// Transport-neutral HTTP adapter in front of the dispatcher

use crate::protocol::{JsonRpcError, JsonRpcResponse, INTERNAL_ERROR, METHOD_NOT_FOUND};
use crate::redact::{redact_headers, truncate_body};
use crate::runtime::ServerRuntime;
use crate::server::Reply;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const MCP_PATH: &str = "/mcp";
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
pub const SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// Preflight responses may be cached for a day.
const CORS_MAX_AGE: &str = "86400";

/// An HTTP request reduced to what the adapter needs.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Correlation id supplied by the hosting platform, if any.
    pub request_id: Option<String>,
}

impl HttpRequest {
    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            path: path.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Empty when a notification was accepted.
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Turns `(method, path, headers, body)` into `(status, headers, body)`.
#[derive(Clone)]
pub struct HttpHandler {
    runtime: Arc<ServerRuntime>,
}

impl HttpHandler {
    pub fn new(runtime: Arc<ServerRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<ServerRuntime> {
        &self.runtime
    }

    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let started = Instant::now();
        let request_id = request
            .request_id
            .clone()
            .or_else(|| request.header(REQUEST_ID_HEADER).map(str::to_string))
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        info!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            "Incoming request"
        );
        debug!(
            request_id = %request_id,
            headers = ?redact_headers(&request.headers),
            body = %truncate_body(&request.body),
            "Request details"
        );

        let response = self.route(&request, &request_id).await;

        info!(
            request_id = %request_id,
            status = response.status,
            duration_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }

    async fn route(&self, request: &HttpRequest, request_id: &str) -> HttpResponse {
        let mut headers = base_headers(request_id);

        if request.method.eq_ignore_ascii_case("OPTIONS") {
            headers.insert("Access-Control-Max-Age".to_string(), CORS_MAX_AGE.to_string());
            return HttpResponse {
                status: 200,
                headers,
                body: String::new(),
            };
        }

        if request.path != MCP_PATH {
            return error_response(404, headers, JsonRpcError::new(METHOD_NOT_FOUND, "Not Found"));
        }

        if !request.method.eq_ignore_ascii_case("POST") {
            headers.insert("Allow".to_string(), "POST".to_string());
            return error_response(
                405,
                headers,
                JsonRpcError::new(METHOD_NOT_FOUND, "Method Not Allowed"),
            );
        }

        let message: Value = match serde_json::from_str(&request.body) {
            Ok(message) => message,
            Err(e) => {
                return error_response(400, headers, JsonRpcError::parse_error(e.to_string()))
            }
        };

        let server = match self.runtime.server().await {
            Ok(server) => server,
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Server initialization failed");
                let message = if e.is_config() {
                    "Server configuration error"
                } else {
                    "Internal error"
                };
                return error_response(
                    500,
                    headers,
                    JsonRpcError::new(INTERNAL_ERROR, message).with_data(e.to_string()),
                );
            }
        };

        if message.get("method").and_then(Value::as_str) == Some("initialize") {
            headers.insert(SESSION_ID_HEADER.to_string(), Uuid::new_v4().to_string());
        }

        match server.handle_value(message).await {
            Reply::Suppressed => HttpResponse {
                status: 200,
                headers,
                body: String::new(),
            },
            Reply::Response(response) => json_response(200, headers, &response),
        }
    }
}

fn base_headers(request_id: &str) -> BTreeMap<String, String> {
    [
        ("Content-Type", "application/json"),
        (REQUEST_ID_HEADER, request_id),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "POST, OPTIONS"),
        ("Access-Control-Allow-Headers", "content-type"),
        ("Access-Control-Expose-Headers", "x-request-id, mcp-session-id"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}

fn error_response(
    status: u16,
    headers: BTreeMap<String, String>,
    error: JsonRpcError,
) -> HttpResponse {
    json_response(status, headers, &JsonRpcResponse::error(Value::Null, error))
}

fn json_response(
    status: u16,
    headers: BTreeMap<String, String>,
    response: &JsonRpcResponse,
) -> HttpResponse {
    match serde_json::to_string(response) {
        Ok(body) => HttpResponse {
            status,
            headers,
            body,
        },
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            HttpResponse {
                status: 500,
                headers,
                body: r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#
                    .to_string(),
            }
        }
    }
}
