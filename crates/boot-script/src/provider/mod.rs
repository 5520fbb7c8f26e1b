//! Node providers
//!
//! A provider is a source of node inventory consulted when the authoritative
//! store has no match, and listed by the synchronizer. The active provider is
//! chosen once at startup from `ProviderConfig`.

pub mod file;
pub mod hsm;

use crate::error::ProviderError;
use crate::models::InventoryComponent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use file::{FileProvider, FileProviderConfig};
pub use hsm::HsmProvider;

/// Trait for node inventory sources
#[async_trait::async_trait]
pub trait NodeProvider: Send + Sync {
    /// `"hsm"` or `"file"`
    fn provider_type(&self) -> &'static str;

    /// Look up a node by xname, NID or MAC, in that order.
    ///
    /// Returns `ProviderError::NotFound` when the identifier is unknown and
    /// `ProviderError::Unavailable` when the source cannot be reached.
    async fn get_by_identifier(&self, identifier: &str) -> Result<InventoryComponent, ProviderError>;

    /// Every node, each listed once
    async fn list_all(&self) -> Result<Vec<InventoryComponent>, ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError>;

    /// Diagnostic counters
    fn stats(&self) -> serde_json::Map<String, serde_json::Value>;
}

/// Provider selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Remote Hardware State Manager
    Hsm(hsm_client::HsmConfig),
    /// Declarative YAML nodes file
    File(FileProviderConfig),
}

/// Build the configured provider
///
/// The file provider performs its initial load here and fails if the file
/// cannot be read or parsed.
pub async fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn NodeProvider>, ProviderError> {
    match config {
        ProviderConfig::Hsm(hsm) => Ok(Arc::new(HsmProvider::from_config(hsm.clone())?)),
        ProviderConfig::File(file) => Ok(Arc::new(FileProvider::new(file.clone()).await?)),
    }
}
