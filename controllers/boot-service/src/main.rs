//! Boot Script Service
//!
//! Serves iPXE boot scripts to bare-metal nodes. Nodes are resolved from the
//! in-process store, falling back to the configured provider (a remote HSM or
//! a YAML nodes file), which is also synchronized into the store in the
//! background.

mod config;
mod controller;
mod error;
mod http;

use anyhow::{Context, Result};
use config::ServiceConfig;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Boot Script Service");

    let config = ServiceConfig::load().context("failed to load configuration")?;
    config.log_summary();

    let controller = Controller::new(config)
        .await
        .context("failed to initialize service")?;
    controller.run().await.context("server terminated with error")?;

    info!("Boot Script Service stopped");
    Ok(())
}
