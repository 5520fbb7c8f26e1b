//! HsmClient trait for mocking
//!
//! Abstracts the HSM client so node providers can be exercised in unit tests
//! without a running inventory service.

use crate::client::ClientStats;
use crate::error::HsmError;
use crate::models::*;
use std::sync::Arc;

/// Trait for HSM API client operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait HsmClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// All components known to HSM
    async fn get_components(&self) -> Result<Arc<Vec<Component>>, HsmError>;

    /// A single component by xname. Returns `HsmError::NotFound` on 404.
    async fn get_component(&self, id: &str) -> Result<Arc<Component>, HsmError>;

    async fn get_ethernet_interfaces(&self) -> Result<Arc<Vec<EthernetInterface>>, HsmError>;

    /// Resolve the component owning the interface with this MAC.
    async fn get_component_by_mac(&self, mac: &str) -> Result<Arc<Component>, HsmError>;

    /// Readiness probe; never served from cache.
    async fn health(&self) -> Result<(), HsmError>;

    fn clear_cache(&self);

    fn stats(&self) -> ClientStats;
}
