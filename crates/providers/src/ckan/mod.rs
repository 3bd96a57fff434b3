//! Provider for CKAN open data portals.

pub mod aggregate;
pub mod config;
pub mod format;
pub mod tools;

use crate::config::{AuthScheme, RetryConfig, TransportConfig};
use crate::error::TransportError;
use crate::transport::HttpTransport;
use aggregate::AggregateQuery;
use anyhow::{Context, Result};
use async_trait::async_trait;
use config::CkanConfig;
use opencontext_core::{
    Arguments, Provider, ProviderCategory, ProviderDescriptor, SqlValidator, ToolDescriptor,
    ToolOutcome,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

pub const PROVIDER_NAME: &str = "ckan";

const DEFAULT_SEARCH_LIMIT: i64 = 20;
const DEFAULT_QUERY_LIMIT: i64 = 100;

/// Envelope of every CKAN action response.
#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<Value>,
}

pub struct CkanProvider {
    config: CkanConfig,
    retry_config: RetryConfig,
    validator: SqlValidator,
    client: RwLock<Option<HttpTransport>>,
}

impl CkanProvider {
    pub fn new(config: CkanConfig) -> Self {
        Self {
            config,
            retry_config: RetryConfig::default(),
            validator: SqlValidator::default(),
            client: RwLock::new(None),
        }
    }

    /// Build from a raw configuration section.
    pub fn from_section(section: Value) -> Result<Self> {
        Ok(Self::new(CkanConfig::from_value(section)?))
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn with_validator(mut self, validator: SqlValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &CkanConfig {
        &self.config
    }

    fn build_transport(&self) -> Result<HttpTransport> {
        let base_url = url::Url::parse(&self.config.base_url).context("invalid base_url")?;
        let transport_config = TransportConfig {
            base_url,
            api_key: self.config.api_key.clone(),
            auth_scheme: AuthScheme::Raw,
            timeout: self.config.timeout(),
            retry_config: self.retry_config.clone(),
        };
        Ok(HttpTransport::new(Arc::new(transport_config))?)
    }

    async fn client(&self) -> Result<HttpTransport> {
        self.client
            .read()
            .await
            .clone()
            .context("CKAN provider is not activated")
    }

    /// Call a CKAN action and return its `result` payload.
    async fn call_action(&self, action: &str, body: Value) -> Result<Value> {
        let client = self.client().await?;
        debug!(action = action, "Calling CKAN action");

        let response: ActionResponse = client
            .post(&format!("/api/3/action/{}", action), &body)
            .await?;

        if !response.success {
            let message = response
                .error
                .as_ref()
                .and_then(|e| e.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("CKAN action {} was not successful", action));
            return Err(TransportError::Api {
                status: 200,
                message,
            }
            .into());
        }

        Ok(response.result)
    }

    pub async fn search_datasets(&self, query: &str, limit: i64) -> Result<Vec<Value>> {
        let result = self
            .call_action("package_search", json!({"q": query, "rows": limit}))
            .await?;
        Ok(array_field(&result, "results"))
    }

    pub async fn get_dataset(&self, dataset_id: &str) -> Result<Value> {
        self.call_action("package_show", json!({"id": dataset_id}))
            .await
    }

    pub async fn query_data(
        &self,
        resource_id: &str,
        filters: Option<&Value>,
        limit: i64,
    ) -> Result<Vec<Value>> {
        let mut body = json!({"resource_id": resource_id, "limit": limit});
        if let Some(filters) = filters.filter(|f| f.as_object().is_some_and(|m| !m.is_empty())) {
            body["filters"] = filters.clone();
        }

        let result = self.call_action("datastore_search", body).await?;
        Ok(array_field(&result, "records"))
    }

    pub async fn get_schema(&self, resource_id: &str) -> Result<Vec<Value>> {
        let result = self
            .call_action(
                "datastore_search",
                json!({"resource_id": resource_id, "limit": 0}),
            )
            .await?;
        Ok(array_field(&result, "fields"))
    }

    /// Run a query that has already passed validation.
    async fn search_sql(&self, sql: &str) -> Result<Value> {
        self.call_action("datastore_search_sql", json!({"sql": sql}))
            .await
    }

    async fn run_tool(&self, name: &str, arguments: &Arguments) -> Result<ToolOutcome> {
        let outcome = match name {
            tools::SEARCH_DATASETS => {
                let Some(query) = required_str(arguments, "query") else {
                    return Ok(missing("query"));
                };
                let limit = int_arg(arguments, "limit", DEFAULT_SEARCH_LIMIT);
                let datasets = self.search_datasets(query, limit).await?;
                ToolOutcome::text(format::search_results(&self.config, &datasets))
            }
            tools::GET_DATASET => {
                let Some(dataset_id) = required_str(arguments, "dataset_id") else {
                    return Ok(missing("dataset_id"));
                };
                let dataset = self.get_dataset(dataset_id).await?;
                ToolOutcome::text(format::dataset(&self.config, &dataset))
            }
            tools::QUERY_DATA => {
                let Some(resource_id) = required_str(arguments, "resource_id") else {
                    return Ok(missing("resource_id"));
                };
                let limit = int_arg(arguments, "limit", DEFAULT_QUERY_LIMIT);
                let records = self
                    .query_data(resource_id, arguments.get("filters"), limit)
                    .await?;
                ToolOutcome::text(format::query_results(&records, limit))
            }
            tools::GET_SCHEMA => {
                let Some(resource_id) = required_str(arguments, "resource_id") else {
                    return Ok(missing("resource_id"));
                };
                let fields = self.get_schema(resource_id).await?;
                ToolOutcome::text(format::schema(&fields))
            }
            tools::EXECUTE_SQL => {
                let Some(sql) = required_str(arguments, "sql") else {
                    return Ok(missing("sql"));
                };
                if let Err(rejection) = self.validator.validate(sql) {
                    warn!(reason = %rejection, "Rejected SQL query");
                    return Ok(ToolOutcome::failure(format!(
                        "SQL validation failed: {}",
                        rejection
                    )));
                }
                let result = self.search_sql(sql).await?;
                ToolOutcome::text(format::sql_results(&result))
            }
            tools::AGGREGATE_DATA => {
                let query = match AggregateQuery::from_arguments(arguments) {
                    Ok(query) => query,
                    Err(message) => return Ok(ToolOutcome::failure(message)),
                };
                let sql = match query.to_sql() {
                    Ok(sql) => sql,
                    Err(message) => return Ok(ToolOutcome::failure(message)),
                };
                if let Err(rejection) = self.validator.validate(&sql) {
                    warn!(reason = %rejection, "Rejected aggregation query");
                    return Ok(ToolOutcome::failure(format!(
                        "SQL validation failed: {}",
                        rejection
                    )));
                }
                debug!(sql = %sql, "Running aggregation");
                let result = self.search_sql(&sql).await?;
                ToolOutcome::text(format!("{}\n\nSQL: {}", format::sql_results(&result), sql))
            }
            other => ToolOutcome::failure(format!("Unknown tool: {}", other)),
        };

        Ok(outcome)
    }

    async fn status_ok(&self) -> Result<bool> {
        let client = self.client().await?;
        let response: ActionResponse = client.post("/api/3/action/status_show", &json!({})).await?;
        Ok(response.success)
    }
}

#[async_trait]
impl Provider for CkanProvider {
    fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            name: PROVIDER_NAME,
            category: ProviderCategory::OpenData,
            version: "1.0.0",
        }
    }

    async fn activate(&self) -> Result<bool> {
        let transport = self.build_transport()?;
        let response: ActionResponse = transport
            .post("/api/3/action/status_show", &json!({}))
            .await
            .context("CKAN connection test failed")?;

        if !response.success {
            error!(base_url = %self.config.base_url, "CKAN status_show reported failure");
            return Ok(false);
        }

        *self.client.write().await = Some(transport);
        info!(city = %self.config.city_name, "CKAN provider activated");
        Ok(true)
    }

    async fn deactivate(&self) -> Result<()> {
        self.client.write().await.take();
        info!("CKAN provider deactivated");
        Ok(())
    }

    fn list_tools(&self) -> Vec<ToolDescriptor> {
        tools::descriptors(&self.config.city_name)
    }

    async fn execute_tool(&self, name: &str, arguments: Arguments) -> Result<ToolOutcome> {
        match self.run_tool(name, &arguments).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(tool = name, error = %e, "Error executing CKAN tool");
                Ok(ToolOutcome::failure(format!("Tool execution failed: {}", e)))
            }
        }
    }

    async fn check_health(&self) -> Result<bool> {
        match self.status_ok().await {
            Ok(healthy) => Ok(healthy),
            Err(e) => {
                warn!(error = %e, "CKAN health check failed");
                Ok(false)
            }
        }
    }
}

fn required_str<'a>(arguments: &'a Arguments, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn int_arg(arguments: &Arguments, key: &str, default: i64) -> i64 {
    arguments.get(key).and_then(Value::as_i64).unwrap_or(default)
}

fn missing(key: &str) -> ToolOutcome {
    ToolOutcome::failure(format!("{} is required", key))
}

fn array_field(result: &Value, key: &str) -> Vec<Value> {
    result
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
