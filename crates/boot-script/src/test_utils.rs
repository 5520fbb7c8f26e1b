//! Test utilities for unit testing the boot engine
//!
//! Helpers for building nodes, boot configurations and mock-backed providers.

use crate::error::ProviderError;
use crate::models::{BootConfiguration, InventoryComponent, Node};
use crate::provider::{HsmProvider, NodeProvider};
use hsm_client::{node_component, MockHsmClient};
use std::sync::Arc;
use std::time::Duration;

/// Node with NID and boot MAC set
pub fn create_test_node(xname: &str, nid: u32, mac: &str) -> Node {
    Node {
        nid: Some(nid),
        boot_mac: Some(mac.to_string()),
        role: "Compute".to_string(),
        state: "Ready".to_string(),
        ..Node::new(xname)
    }
}

/// Selector-less configuration with a kernel, initrd and params
pub fn create_test_config(name: &str) -> BootConfiguration {
    BootConfiguration {
        name: name.to_string(),
        kernel: "http://boot.example.com/images/vmlinuz".to_string(),
        initrd: "http://boot.example.com/images/initrd.img".to_string(),
        params: "console=tty0".to_string(),
        ..BootConfiguration::default()
    }
}

/// HSM provider over a mock with two compute nodes
pub fn create_test_hsm_provider() -> (Arc<HsmProvider>, MockHsmClient) {
    let mock = MockHsmClient::new("http://hsm:27779");
    mock.add_component(node_component("x1000c0s0b0n0", "Compute", Some(1)));
    mock.add_component(node_component("x1000c0s0b1n0", "Compute", Some(2)));
    mock.add_interface("a4:bf:01:00:00:01", "x1000c0s0b0n0");
    mock.add_interface("a4:bf:01:00:00:02", "x1000c0s0b1n0");
    (Arc::new(HsmProvider::new(Arc::new(mock.clone()))), mock)
}

/// Provider whose lookups never answer within a request
#[derive(Debug)]
pub struct StalledProvider {
    pub delay: Duration,
}

#[async_trait::async_trait]
impl NodeProvider for StalledProvider {
    fn provider_type(&self) -> &'static str {
        "hsm"
    }

    async fn get_by_identifier(&self, identifier: &str) -> Result<InventoryComponent, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Err(ProviderError::NotFound(identifier.to_string()))
    }

    async fn list_all(&self) -> Result<Vec<InventoryComponent>, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn stats(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }
}
