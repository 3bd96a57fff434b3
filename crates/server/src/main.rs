use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opencontext_mcp::{HttpHandler, ServerRuntime};
use std::path::PathBuf;
use std::sync::Arc;

mod api;
mod config;
mod stdio;

#[derive(Parser, Debug)]
#[command(name = "opencontext")]
#[command(about = "MCP tool server exposing one open-data provider", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "OPENCONTEXT_CONFIG_FILE",
        default_value = "config.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve MCP over HTTP at /mcp
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
    /// Serve MCP over stdin/stdout, one JSON message per line
    Stdio,
    /// Check the configuration and list discovered providers
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (app_config, source) = config::load(&args.config)?;
    config::init_tracing(&app_config.logging)?;
    tracing::info!(source = %source, "Configuration loaded");

    let runtime = ServerRuntime::new(app_config, opencontext_providers::builtin_catalog());

    match args.command {
        Command::Serve { host, port } => {
            let runtime = Arc::new(runtime);
            runtime
                .server()
                .await
                .context("Failed to initialize provider registry")?;

            let addr = format!("{}:{}", host, port);
            api::serve(&addr, HttpHandler::new(runtime.clone())).await?;
            shutdown(runtime).await;
        }
        Command::Stdio => {
            let mut runtime = runtime;
            let server = runtime
                .server()
                .await
                .context("Failed to initialize provider registry")?;
            let result = stdio::run(&server).await;
            drop(server);
            runtime.shutdown().await;
            result?;
        }
        Command::Validate => validate(runtime.config())?,
    }

    Ok(())
}

async fn shutdown(runtime: Arc<ServerRuntime>) {
    match Arc::try_unwrap(runtime) {
        Ok(mut runtime) => runtime.shutdown().await,
        Err(_) => tracing::warn!("Runtime still shared at exit; skipping provider shutdown"),
    }
}

fn validate(app_config: &opencontext_core::AppConfig) -> Result<()> {
    let (enabled, _) = app_config.enabled_provider()?;
    let discovered = opencontext_providers::builtin_catalog().discover();

    println!("Enabled provider: {}", enabled);
    println!("Discovered providers:");
    for provider in &discovered {
        println!("  {} ({})", provider.name, provider.location);
    }

    if !discovered.iter().any(|p| p.name == enabled) {
        anyhow::bail!("Enabled provider '{}' is not available", enabled);
    }
    println!("Configuration OK");
    Ok(())
}
