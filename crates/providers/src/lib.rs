//! # OpenContext providers
//!
//! Data source connectors for the OpenContext tool server, plus the
//! retrying HTTP transport they share.
//!
//! ```rust,no_run
//! use opencontext_core::{AppConfig, ProviderRegistry};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AppConfig::load(std::path::Path::new("config.toml"))?;
//! let mut registry = ProviderRegistry::new(config, opencontext_providers::builtin_catalog());
//! registry.load().await?;
//! # Ok(())
//! # }
//! ```

pub mod ckan;
pub mod config;
pub mod error;
pub mod example;
pub mod transport;

pub use ckan::CkanProvider;
pub use error::{TransportError, TransportResult};
pub use example::ExampleApiProvider;

use opencontext_core::{Provider, ProviderCatalog, ProviderSource};

/// Catalog with every provider shipped in this crate.
pub fn builtin_catalog() -> ProviderCatalog {
    let mut catalog = ProviderCatalog::new();
    catalog.register(ckan::PROVIDER_NAME, ProviderSource::BuiltIn, |section| {
        Ok(Box::new(CkanProvider::from_section(section)?) as Box<dyn Provider>)
    });
    catalog.register(example::PROVIDER_NAME, ProviderSource::Custom, |section| {
        Ok(Box::new(ExampleApiProvider::from_section(section)?) as Box<dyn Provider>)
    });
    catalog
}
