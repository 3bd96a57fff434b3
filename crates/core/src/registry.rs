// Provider catalog and the registry that loads the single active provider

use crate::config::AppConfig;
use crate::error::RegistryError;
use crate::provider::{Arguments, Provider};
use crate::types::{ToolDescriptor, ToolOutcome};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Builds a provider from its configuration section.
pub type ProviderFactory =
    Arc<dyn Fn(Value) -> anyhow::Result<Box<dyn Provider>> + Send + Sync>;

/// Names starting with this marker are never discovered.
pub const RESERVED_MARKER: char = '_';

/// Where a provider implementation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSource {
    /// Shipped with the server.
    BuiltIn,
    /// Supplied by the deploying user.
    Custom,
}

impl ProviderSource {
    fn directory(&self) -> &'static str {
        match self {
            Self::BuiltIn => "plugins",
            Self::Custom => "custom_plugins",
        }
    }
}

/// A provider found by [`ProviderCatalog::discover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProvider {
    pub name: String,
    pub source: ProviderSource,
    pub location: String,
}

#[derive(Clone)]
struct CatalogEntry {
    source: ProviderSource,
    factory: Option<ProviderFactory>,
}

/// Explicit registration table from provider name to constructor.
#[derive(Clone, Default)]
pub struct ProviderCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider constructor under `name`. A later registration
    /// with the same name replaces the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, source: ProviderSource, factory: F)
    where
        F: Fn(Value) -> anyhow::Result<Box<dyn Provider>> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.into(),
            CatalogEntry {
                source,
                factory: Some(Arc::new(factory)),
            },
        );
    }

    /// List a name without an entry point. Such entries are never discovered.
    pub fn declare(&mut self, name: impl Into<String>, source: ProviderSource) {
        self.entries.insert(
            name.into(),
            CatalogEntry {
                source,
                factory: None,
            },
        );
    }

    /// Every loadable provider, sorted by name.
    pub fn discover(&self) -> Vec<DiscoveredProvider> {
        self.entries
            .iter()
            .filter(|(name, _)| !name.starts_with(RESERVED_MARKER))
            .filter(|(_, entry)| entry.factory.is_some())
            .map(|(name, entry)| DiscoveredProvider {
                name: name.clone(),
                source: entry.source,
                location: format!("{}/{}", entry.source.directory(), name),
            })
            .collect()
    }

    fn factory(&self, name: &str) -> Option<&ProviderFactory> {
        self.entries.get(name).and_then(|e| e.factory.as_ref())
    }
}

impl fmt::Debug for ProviderCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCatalog")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct RegisteredTool {
    provider: String,
    local_name: String,
    descriptor: ToolDescriptor,
}

/// Loads the one enabled provider and routes prefixed tool names to it.
///
/// Loading takes `&mut self`; once loaded the registry is only read, so it
/// can be shared behind an `Arc` without locks.
pub struct ProviderRegistry {
    config: AppConfig,
    catalog: ProviderCatalog,
    providers: BTreeMap<String, Arc<dyn Provider>>,
    tools: BTreeMap<String, RegisteredTool>,
    loaded: bool,
}

impl ProviderRegistry {
    pub fn new(config: AppConfig, catalog: ProviderCatalog) -> Self {
        Self {
            config,
            catalog,
            providers: BTreeMap::new(),
            tools: BTreeMap::new(),
            loaded: false,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Names of the loaded providers.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Validate configuration, then discover, instantiate, activate and
    /// register the enabled provider.
    pub async fn load(&mut self) -> Result<(), RegistryError> {
        if self.loaded {
            warn!("Provider registry already loaded; ignoring repeated load");
            return Ok(());
        }

        let (name, section) = {
            let (name, section) = self.config.enabled_provider()?;
            (name.to_string(), section.clone())
        };
        info!(provider = %name, "Loading provider");

        let discovered = self.catalog.discover();
        let Some(found) = discovered.iter().find(|d| d.name == name) else {
            let available = discovered
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(RegistryError::load(
                &name,
                format!("provider not found. Available providers: {}", available),
            ));
        };
        debug!(provider = %name, location = %found.location, "Provider discovered");

        let factory = self
            .catalog
            .factory(&name)
            .ok_or_else(|| RegistryError::load(&name, "no provider entry point registered"))?;

        let provider: Arc<dyn Provider> = factory(section)
            .map(Arc::from)
            .map_err(|e| RegistryError::load(&name, format!("failed to instantiate: {:#}", e)))?;

        match provider.activate().await {
            Ok(true) => {}
            Ok(false) => {
                release(&name, provider.as_ref()).await;
                return Err(RegistryError::load(&name, "activation returned false"));
            }
            Err(e) => {
                release(&name, provider.as_ref()).await;
                return Err(RegistryError::load(
                    &name,
                    format!("activation failed: {:#}", e),
                ));
            }
        }

        for tool in provider.list_tools() {
            let full_name = format!("{}.{}", name, tool.name);
            if self.tools.contains_key(&full_name) {
                warn!(tool = %full_name, "Tool name collision, later registration wins");
            }
            debug!(tool = %full_name, "Registered tool");

            let descriptor = ToolDescriptor {
                name: full_name.clone(),
                ..tool.clone()
            };
            self.tools.insert(
                full_name,
                RegisteredTool {
                    provider: name.clone(),
                    local_name: tool.name,
                    descriptor,
                },
            );
        }

        let descriptor = provider.descriptor();
        self.providers.insert(name.clone(), provider);
        self.loaded = true;

        info!(
            provider = %name,
            category = %descriptor.category,
            version = descriptor.version,
            tools = self.tools.len(),
            "Provider loaded"
        );
        Ok(())
    }

    /// Run a tool by its prefixed name.
    ///
    /// Unknown names and an unloaded registry are errors; anything that goes
    /// wrong inside the provider comes back as a failed [`ToolOutcome`].
    pub async fn execute_tool(
        &self,
        full_name: &str,
        arguments: Arguments,
    ) -> Result<ToolOutcome, RegistryError> {
        if !self.loaded {
            return Err(RegistryError::NotInitialized);
        }

        let tool = self
            .tools
            .get(full_name)
            .ok_or_else(|| RegistryError::ToolNotFound {
                name: full_name.to_string(),
                available: self.tools.keys().cloned().collect(),
            })?;

        let provider = self
            .providers
            .get(&tool.provider)
            .ok_or_else(|| RegistryError::ProviderMissing(tool.provider.clone()))?;

        debug!(tool = %full_name, "Executing tool");
        match provider.execute_tool(&tool.local_name, arguments).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(tool = %full_name, error = %e, "Tool execution failed");
                Ok(ToolOutcome::failure(format!("Tool execution failed: {}", e)))
            }
        }
    }

    /// Every registered tool with its prefixed name.
    pub fn list_all_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor.clone()).collect()
    }

    /// Health of each loaded provider. A failed probe counts as unhealthy.
    pub async fn check_health(&self) -> BTreeMap<String, bool> {
        let mut health = BTreeMap::new();
        for (name, provider) in &self.providers {
            let healthy = match provider.check_health().await {
                Ok(healthy) => healthy,
                Err(e) => {
                    warn!(provider = %name, error = %e, "Health check failed");
                    false
                }
            };
            health.insert(name.clone(), healthy);
        }
        health
    }

    /// Deactivate every provider and forget all registrations.
    pub async fn shutdown(&mut self) {
        for (name, provider) in &self.providers {
            release(name, provider.as_ref()).await;
        }
        self.providers.clear();
        self.tools.clear();
        self.loaded = false;
        info!("Provider registry shut down");
    }
}

async fn release(name: &str, provider: &dyn Provider) {
    match provider.deactivate().await {
        Ok(()) => debug!(provider = %name, "Provider deactivated"),
        Err(e) => error!(provider = %name, error = %e, "Error deactivating provider"),
    }
}
