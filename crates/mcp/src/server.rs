// Protocol dispatcher: routes JSON-RPC messages to the provider registry

use crate::protocol::{
    CallToolResult, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ServerCapabilities, ServerInfo, ToolSchema, ToolsCapability,
    PROTOCOL_VERSION,
};
use opencontext_core::{Arguments, ProviderRegistry, RegistryError};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

/// What the transport should do with a dispatched message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Response(JsonRpcResponse),
    /// Nothing is sent back. Always the case for notifications.
    Suppressed,
}

impl Reply {
    pub fn into_response(self) -> Option<JsonRpcResponse> {
        match self {
            Self::Response(response) => Some(response),
            Self::Suppressed => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Tool name is required")]
    MissingToolName,

    #[error("Tool arguments must be an object")]
    InvalidArguments,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

enum Routed {
    Result(Value),
    Silent,
}

/// MCP server over a loaded [`ProviderRegistry`].
///
/// Holds no per-connection state; every message is handled on its own.
pub struct McpServer {
    registry: ProviderRegistry,
    server_info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            server_info: ServerInfo::default(),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> ProviderRegistry {
        self.registry
    }

    /// Handle a raw JSON message.
    ///
    /// An object without an `id` is a notification and is never answered,
    /// even when it is malformed. Other values that are not a request
    /// envelope get an invalid-request error.
    pub async fn handle_value(&self, message: Value) -> Reply {
        let id = match &message {
            Value::Object(map) => map.get("id").cloned(),
            _ => Some(Value::Null),
        };

        match serde_json::from_value::<JsonRpcRequest>(message) {
            Ok(request) => self.handle(request).await,
            Err(e) => match id {
                Some(id) => {
                    warn!(error = %e, "Invalid JSON-RPC request");
                    Reply::Response(JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_request(e.to_string()),
                    ))
                }
                None => {
                    warn!(error = %e, "Dropping malformed notification");
                    Reply::Suppressed
                }
            },
        }
    }

    pub async fn handle(&self, request: JsonRpcRequest) -> Reply {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;
        debug!(method = %method, notification = id.is_none(), "Dispatching message");

        let routed = self.route(&method, params).await;
        match (id, routed) {
            (_, Ok(Routed::Silent)) => Reply::Suppressed,
            (Some(id), Ok(Routed::Result(result))) => {
                Reply::Response(JsonRpcResponse::success(id, result))
            }
            (None, Ok(Routed::Result(_))) => {
                debug!(method = %method, "Result of notification discarded");
                Reply::Suppressed
            }
            (None, Err(DispatchError::UnknownMethod(_))) => {
                warn!(method = %method, "Ignoring unknown notification");
                Reply::Suppressed
            }
            (None, Err(e)) => {
                error!(method = %method, error = %e, "Error handling notification");
                Reply::Suppressed
            }
            (Some(id), Err(e)) => {
                error!(method = %method, error = %e, "Error handling request");
                Reply::Response(JsonRpcResponse::error(
                    id,
                    JsonRpcError::internal_error(e.to_string()),
                ))
            }
        }
    }

    async fn route(&self, method: &str, params: Option<Value>) -> Result<Routed, DispatchError> {
        match method {
            "initialize" => self.initialize(params.as_ref()).map(Routed::Result),
            "tools/list" => self.list_tools().map(Routed::Result),
            "tools/call" => self.call_tool(params).await.map(Routed::Result),
            "ping" => Ok(Routed::Result(json!({"status": "ok"}))),
            "notifications/initialized" => {
                debug!("Client initialized");
                Ok(Routed::Silent)
            }
            other => Err(DispatchError::UnknownMethod(other.to_string())),
        }
    }

    fn initialize(&self, params: Option<&Value>) -> Result<Value, DispatchError> {
        let client = params
            .and_then(|p| p.get("clientInfo"))
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(client = client, "MCP client initializing");

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: self.server_info.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn list_tools(&self) -> Result<Value, DispatchError> {
        let tools: Vec<ToolSchema> = self
            .registry
            .list_all_tools()
            .into_iter()
            .map(ToolSchema::from)
            .collect();
        debug!(count = tools.len(), "Listing tools");
        Ok(serde_json::to_value(ListToolsResult { tools })?)
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, DispatchError> {
        let mut params = match params {
            Some(Value::Object(map)) => map,
            _ => Arguments::new(),
        };

        let name = match params.remove("name") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => return Err(DispatchError::MissingToolName),
        };
        let arguments = match params.remove("arguments") {
            None | Some(Value::Null) => Arguments::new(),
            Some(Value::Object(arguments)) => arguments,
            Some(_) => return Err(DispatchError::InvalidArguments),
        };

        info!(tool = %name, "Calling tool");
        let outcome = self.registry.execute_tool(&name, arguments).await?;
        if let Some(message) = outcome.error_message() {
            warn!(tool = %name, error = %message, "Tool reported failure");
        }

        Ok(serde_json::to_value(CallToolResult::from(outcome))?)
    }
}
