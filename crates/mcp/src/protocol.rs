// MCP protocol types (JSON-RPC 2.0 envelopes and MCP payloads)

use opencontext_core::{ContentBlock, ToolDescriptor, ToolOutcome};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// MCP revision advertised in `initialize` replies.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INTERNAL_ERROR: i32 = -32603;

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// Any `id` that appears in the message, `null` included, is kept.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// The version marker plays no part in routing; a non-string value is kept
/// in its JSON form rather than rejecting the envelope.
fn version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(version) => version,
        other => other.to_string(),
    })
}

/// JSON-RPC 2.0 Request
///
/// A message without an `id` is a notification and never gets a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_version", deserialize_with = "version")]
    pub jsonrpc: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(Value::String(data.into()));
        self
    }

    pub fn parse_error(cause: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, "Parse error").with_data(cause)
    }

    pub fn invalid_request(cause: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request").with_data(cause)
    }

    /// Every failed call is reported this way; the cause goes in `data`.
    pub fn internal_error(cause: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, "Internal error").with_data(cause)
    }
}

// MCP-specific protocol messages

/// Tool definition for MCP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl From<ToolDescriptor> for ToolSchema {
    fn from(tool: ToolDescriptor) -> Self {
        Self {
            name: tool.name,
            description: tool.description,
            input_schema: tool.input_schema,
        }
    }
}

/// List tools response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolSchema>,
}

/// Call tool response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ToolOutcome> for CallToolResult {
    fn from(outcome: ToolOutcome) -> Self {
        if outcome.is_success() {
            return Self {
                content: outcome.into_content(),
                is_error: None,
                error: None,
            };
        }

        let error = outcome.error_message().map(str::to_string);
        Self {
            content: outcome.into_content(),
            is_error: Some(true),
            error,
        }
    }
}

/// Initialize response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "opencontext".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_id_is_notification() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"method": "notifications/initialized"})).unwrap();
        assert!(request.is_notification());
        assert_eq!(request.jsonrpc, "2.0");
        assert!(request.params.is_none());
    }

    #[test]
    fn test_null_id_is_call() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": null, "method": "ping"}))
                .unwrap();
        assert_eq!(request.id, Some(Value::Null));
        assert!(!request.is_notification());
    }

    #[test]
    fn test_non_string_version_tolerated() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": 2.0, "id": 1, "method": "ping"})).unwrap();
        assert_eq!(request.jsonrpc, "2.0");
        assert_eq!(request.method, "ping");
    }

    #[test]
    fn test_missing_method_rejected() {
        let result = serde_json::from_value::<JsonRpcRequest>(json!({"id": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_internal_error_shape() {
        let response = JsonRpcResponse::error(json!(7), JsonRpcError::internal_error("boom"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "error": {"code": -32603, "message": "Internal error", "data": "boom"}
            })
        );
    }

    #[test]
    fn test_tool_schema_field_names() {
        let schema = ToolSchema::from(ToolDescriptor::new(
            "ckan.get_schema",
            "Describe a resource",
            json!({"type": "object"}),
        ));
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["inputSchema"], json!({"type": "object"}));
        assert!(value.get("input_schema").is_none());
    }

    #[test]
    fn test_failed_outcome_marks_error() {
        let result = CallToolResult::from(ToolOutcome::failure("resource_id is required"));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"content": [], "isError": true, "error": "resource_id is required"})
        );

        let result = CallToolResult::from(ToolOutcome::text("ok"));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"content": [{"type": "text", "text": "ok"}]})
        );
    }
}
