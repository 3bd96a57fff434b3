// Provider capability set and tool schema helpers

use crate::types::{ProviderDescriptor, ToolDescriptor, ToolOutcome};
use anyhow::Result;
use serde_json::{Map, Value};

/// Tool arguments as received from the protocol layer.
pub type Arguments = Map<String, Value>;

/// A pluggable connector backing one external data source.
///
/// Methods take `&self`: a provider is shared by every in-flight request, so
/// implementations keep their connection handle behind interior mutability.
/// The `Result` returns exist so the registry can convert any failure that
/// escapes an implementation; providers are still expected to report tool
/// failures as [`ToolOutcome::failure`] rather than `Err`.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Static identity of this provider implementation.
    fn descriptor(&self) -> ProviderDescriptor;

    /// Connect to the data source and check configuration.
    ///
    /// Returns `Ok(false)` when the provider is left in the not-ready state.
    async fn activate(&self) -> Result<bool>;

    /// Release held connections. Safe to call when `activate` never succeeded.
    async fn deactivate(&self) -> Result<()>;

    /// Tools this provider offers. Must not touch the network.
    fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Execute a tool by its local (unprefixed) name.
    async fn execute_tool(&self, name: &str, arguments: Arguments) -> Result<ToolOutcome>;

    /// Best-effort liveness probe against the backing data source.
    async fn check_health(&self) -> Result<bool>;
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_string(description: &str) -> Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_integer(description: &str, default: i64) -> Value {
    serde_json::json!({
        "type": "integer",
        "description": description,
        "default": default
    })
}

pub fn json_schema_map(description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "description": description
    })
}

pub fn json_schema_array(items: Value, description: &str) -> Value {
    serde_json::json!({
        "type": "array",
        "items": items,
        "description": description
    })
}
