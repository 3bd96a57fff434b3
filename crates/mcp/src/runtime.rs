// Lazily initialised, process-wide server state

use crate::server::McpServer;
use opencontext_core::{AppConfig, ProviderCatalog, ProviderRegistry, RegistryError};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Owns the configuration and builds the [`McpServer`] on first use.
///
/// Concurrent first requests share one initialisation. A failed
/// initialisation leaves the cell empty, so the next request tries again.
pub struct ServerRuntime {
    config: AppConfig,
    catalog: ProviderCatalog,
    server: OnceCell<Arc<McpServer>>,
}

impl ServerRuntime {
    pub fn new(config: AppConfig, catalog: ProviderCatalog) -> Self {
        Self {
            config,
            catalog,
            server: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.server.initialized()
    }

    /// The loaded server, initialising it if this is the first call.
    pub async fn server(&self) -> Result<Arc<McpServer>, RegistryError> {
        self.server
            .get_or_try_init(|| async {
                info!("Initializing provider registry");
                let mut registry = ProviderRegistry::new(self.config.clone(), self.catalog.clone());
                registry.load().await?;
                Ok::<_, RegistryError>(Arc::new(McpServer::new(registry)))
            })
            .await
            .cloned()
    }

    /// Shut the registry down. Call once no request holds the server.
    pub async fn shutdown(&mut self) {
        let Some(server) = self.server.take() else {
            return;
        };

        match Arc::try_unwrap(server) {
            Ok(server) => server.into_registry().shutdown().await,
            Err(_) => warn!("Server still in use at shutdown; skipping provider deactivation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opencontext_core::{
        Arguments, Provider, ProviderCategory, ProviderDescriptor, ProviderSource,
        ToolDescriptor, ToolOutcome,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        activations: AtomicUsize,
        deactivated: AtomicBool,
        healthy: AtomicBool,
    }

    struct CountingProvider(Arc<Counters>);

    #[async_trait]
    impl Provider for CountingProvider {
        fn descriptor(&self) -> ProviderDescriptor {
            ProviderDescriptor {
                name: "counting",
                category: ProviderCategory::Analytics,
                version: "0.1.0",
            }
        }

        async fn activate(&self) -> anyhow::Result<bool> {
            tokio::task::yield_now().await;
            self.0.activations.fetch_add(1, Ordering::SeqCst);
            Ok(self.0.healthy.load(Ordering::SeqCst))
        }

        async fn deactivate(&self) -> anyhow::Result<()> {
            self.0.deactivated.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn list_tools(&self) -> Vec<ToolDescriptor> {
            Vec::new()
        }

        async fn execute_tool(&self, name: &str, _: Arguments) -> anyhow::Result<ToolOutcome> {
            Ok(ToolOutcome::failure(format!("Unknown tool: {}", name)))
        }

        async fn check_health(&self) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    fn runtime(counters: &Arc<Counters>) -> ServerRuntime {
        let mut catalog = ProviderCatalog::new();
        let shared = counters.clone();
        catalog.register("counting", ProviderSource::BuiltIn, move |_| {
            Ok(Box::new(CountingProvider(shared.clone())) as Box<dyn Provider>)
        });
        let config =
            AppConfig::from_value(json!({"plugins": {"counting": {"enabled": true}}})).unwrap();
        ServerRuntime::new(config, catalog)
    }

    #[tokio::test]
    async fn test_initializes_once() {
        let counters = Arc::new(Counters::default());
        counters.healthy.store(true, Ordering::SeqCst);
        let runtime = runtime(&counters);

        let (a, b, c) = tokio::join!(runtime.server(), runtime.server(), runtime.server());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(counters.activations.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert!(runtime.is_initialized());
    }

    #[tokio::test]
    async fn test_failed_initialization_retried() {
        let counters = Arc::new(Counters::default());
        let runtime = runtime(&counters);

        let err = runtime.server().await.err().unwrap();
        assert!(matches!(err, RegistryError::Load { .. }));
        assert!(!runtime.is_initialized());

        counters.healthy.store(true, Ordering::SeqCst);
        assert!(runtime.server().await.is_ok());
        assert_eq!(counters.activations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_configuration_error_surfaces() {
        let config = AppConfig::from_value(json!({
            "plugins": {"a": {"enabled": true}, "b": {"enabled": true}}
        }))
        .unwrap();
        let runtime = ServerRuntime::new(config, ProviderCatalog::new());

        let err = runtime.server().await.err().unwrap();
        assert!(err.is_config());
        let message = err.to_string();
        assert!(message.contains("\"a\"") && message.contains("\"b\""));
    }

    #[tokio::test]
    async fn test_shutdown_deactivates() {
        let counters = Arc::new(Counters::default());
        counters.healthy.store(true, Ordering::SeqCst);
        let mut runtime = runtime(&counters);

        runtime.server().await.unwrap();
        runtime.shutdown().await;

        assert!(counters.deactivated.load(Ordering::SeqCst));
        assert!(!runtime.is_initialized());
    }
}
