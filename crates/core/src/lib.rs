// Core types and functionality for the OpenContext tool server

pub mod config;
pub mod error;
pub mod provider;
pub mod registry;
pub mod sql;
pub mod types;

pub use config::{AppConfig, ConfigSource, LogFormat, LoggingConfig};
pub use error::{ConfigError, RegistryError};
pub use provider::{Arguments, Provider};
pub use registry::{DiscoveredProvider, ProviderCatalog, ProviderRegistry, ProviderSource};
pub use sql::{SqlRejection, SqlValidator};
pub use types::*;
