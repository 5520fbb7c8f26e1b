//! Remote inventory provider backed by the HSM client
//!
//! Response caching lives in the client; this layer maps HSM components and
//! ethernet interfaces onto `InventoryComponent`.

use super::NodeProvider;
use crate::error::ProviderError;
use crate::models::InventoryComponent;
use crate::validation::normalize_mac;
use hsm_client::{Component, EthernetInterface, HsmClient, HsmClientTrait, HsmConfig, HsmError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Provider over the Hardware State Manager
pub struct HsmProvider {
    client: Arc<dyn HsmClientTrait>,
}

impl std::fmt::Debug for HsmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HsmProvider")
            .field("base_url", &self.client.base_url())
            .finish()
    }
}

impl HsmProvider {
    pub fn new(client: Arc<dyn HsmClientTrait>) -> Self {
        Self { client }
    }

    pub fn from_config(config: HsmConfig) -> Result<Self, ProviderError> {
        let client = HsmClient::new(config).map_err(|e| ProviderError::Invalid(e.to_string()))?;
        Ok(Self::new(Arc::new(client)))
    }

    /// MACs per owning component ID, in listing order
    fn macs_by_component(interfaces: &[EthernetInterface]) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for iface in interfaces {
            if iface.component_id.is_empty()
                || !(iface.interface_type.is_empty() || iface.interface_type == "Node")
            {
                continue;
            }
            if let Some(mac) = normalize_mac(&iface.mac_address) {
                map.entry(iface.component_id.clone()).or_default().push(mac);
            }
        }
        map
    }

    fn to_inventory(component: &Component, macs: Vec<String>) -> InventoryComponent {
        InventoryComponent {
            id: component.id.clone(),
            xname: component.id.clone(),
            component_type: component.component_type.clone(),
            role: component.role.clone(),
            sub_role: component.sub_role.clone(),
            state: component.state.clone(),
            enabled: component.enabled,
            nid: component.nid,
            boot_mac: macs.first().cloned(),
            macs,
            hostname: String::new(),
            groups: Vec::new(),
        }
    }

    /// Attach interface MACs; a failed interface listing leaves them empty.
    async fn enrich(&self, component: &Component) -> InventoryComponent {
        let macs = match self.client.get_ethernet_interfaces().await {
            Ok(interfaces) => Self::macs_by_component(&interfaces)
                .remove(&component.id)
                .unwrap_or_default(),
            Err(e) => {
                warn!("Failed to list HSM ethernet interfaces for {}: {}", component.id, e);
                Vec::new()
            }
        };
        Self::to_inventory(component, macs)
    }

    async fn find_by_nid(&self, nid: u32) -> Result<Option<Arc<Component>>, HsmError> {
        let components = self.client.get_components().await?;
        Ok(components
            .iter()
            .find(|c| c.nid == Some(nid))
            .cloned()
            .map(Arc::new))
    }
}

#[async_trait::async_trait]
impl NodeProvider for HsmProvider {
    fn provider_type(&self) -> &'static str {
        "hsm"
    }

    async fn get_by_identifier(&self, identifier: &str) -> Result<InventoryComponent, ProviderError> {
        let identifier = identifier.trim();
        let nid = identifier.parse::<u32>().ok();
        let mac = normalize_mac(identifier);

        if nid.is_none() && mac.is_none() {
            match self.client.get_component(identifier).await {
                Ok(component) => return Ok(self.enrich(&component).await),
                Err(e) if e.is_not_found() => debug!("HSM has no component {}", identifier),
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(nid) = nid {
            if let Some(component) = self.find_by_nid(nid).await? {
                return Ok(self.enrich(&component).await);
            }
        }

        if let Some(mac) = mac {
            match self.client.get_component_by_mac(&mac).await {
                Ok(component) => return Ok(self.enrich(&component).await),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        Err(ProviderError::NotFound(identifier.to_string()))
    }

    async fn list_all(&self) -> Result<Vec<InventoryComponent>, ProviderError> {
        let components = self.client.get_components().await?;
        let interfaces = self.client.get_ethernet_interfaces().await?;
        let mut macs = Self::macs_by_component(&interfaces);

        Ok(components
            .iter()
            .map(|c| Self::to_inventory(c, macs.remove(&c.id).unwrap_or_default()))
            .collect())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.client
            .health()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))
    }

    fn stats(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut stats = match serde_json::to_value(self.client.stats()) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        stats.insert("provider_type".to_string(), "hsm".into());
        stats
    }
}
