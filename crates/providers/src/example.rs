//! Minimal custom-API provider, a starting point for user-supplied providers.

use crate::config::{AuthScheme, RetryConfig, TransportConfig};
use crate::transport::HttpTransport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use opencontext_core::provider::{json_schema_object, json_schema_string};
use opencontext_core::{
    Arguments, Provider, ProviderCategory, ProviderDescriptor, ToolDescriptor, ToolOutcome,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

pub const PROVIDER_NAME: &str = "example_api";

#[derive(Debug, Clone, Deserialize)]
pub struct ExampleApiConfig {
    #[serde(default)]
    pub enabled: bool,
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Item {
    name: Option<String>,
    description: Option<String>,
}

pub struct ExampleApiProvider {
    config: ExampleApiConfig,
    retry_config: RetryConfig,
    client: RwLock<Option<HttpTransport>>,
}

impl ExampleApiProvider {
    pub fn from_section(section: Value) -> Result<Self> {
        let config: ExampleApiConfig =
            serde_json::from_value(section).context("invalid example_api configuration")?;
        Ok(Self {
            config,
            retry_config: RetryConfig::default(),
            client: RwLock::new(None),
        })
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    async fn get_item(&self, item_id: &str) -> Result<ToolOutcome> {
        let client = self
            .client
            .read()
            .await
            .clone()
            .context("example_api provider is not activated")?;

        let item: Item = client.get(&format!("/items/{}", item_id)).await?;
        Ok(ToolOutcome::text(format!(
            "Item: {}\nDescription: {}",
            item.name.as_deref().unwrap_or("Unknown"),
            item.description.as_deref().unwrap_or("N/A")
        )))
    }
}

#[async_trait]
impl Provider for ExampleApiProvider {
    fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            name: PROVIDER_NAME,
            category: ProviderCategory::CustomApi,
            version: "1.0.0",
        }
    }

    async fn activate(&self) -> Result<bool> {
        let base_url = url::Url::parse(&self.config.api_url).context("invalid api_url")?;
        let transport = HttpTransport::new(Arc::new(TransportConfig {
            base_url,
            api_key: self.config.api_key.clone(),
            auth_scheme: AuthScheme::Bearer,
            timeout: Duration::from_secs(120),
            retry_config: self.retry_config.clone(),
        }))?;

        if !transport.probe("/health").await? {
            error!(api_url = %self.config.api_url, "Example API health probe failed");
            return Ok(false);
        }

        *self.client.write().await = Some(transport);
        info!("Example API provider activated");
        Ok(true)
    }

    async fn deactivate(&self) -> Result<()> {
        self.client.write().await.take();
        Ok(())
    }

    fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            "get_item",
            "Get an item from the API",
            json_schema_object(json!({"item_id": json_schema_string("Item ID")}), vec!["item_id"]),
        )]
    }

    async fn execute_tool(&self, name: &str, arguments: Arguments) -> Result<ToolOutcome> {
        if name != "get_item" {
            return Ok(ToolOutcome::failure(format!("Unknown tool: {}", name)));
        }

        let Some(item_id) = arguments
            .get("item_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        else {
            return Ok(ToolOutcome::failure("item_id is required"));
        };

        match self.get_item(item_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(tool = name, error = %e, "Error executing example tool");
                Ok(ToolOutcome::failure(format!("Tool execution failed: {}", e)))
            }
        }
    }

    async fn check_health(&self) -> Result<bool> {
        let Some(client) = self.client.read().await.clone() else {
            return Ok(false);
        };
        Ok(client.probe("/health").await.unwrap_or(false))
    }
}
