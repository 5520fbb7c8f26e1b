//! Mock HsmClient for unit testing
//!
//! Stores components and interfaces in memory. Can be switched to an
//! "unavailable" state to exercise transient-failure paths.

use crate::client::ClientStats;
use crate::error::HsmError;
use crate::hsm_trait::HsmClientTrait;
use crate::models::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Mock HsmClient for testing
#[derive(Debug, Clone)]
pub struct MockHsmClient {
    base_url: String,
    components: Arc<Mutex<Vec<Component>>>,
    interfaces: Arc<Mutex<Vec<EthernetInterface>>>,
    calls: Arc<Mutex<HashMap<&'static str, u64>>>,
    unavailable: Arc<AtomicBool>,
    clears: Arc<AtomicU64>,
}

impl MockHsmClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            components: Arc::new(Mutex::new(Vec::new())),
            interfaces: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(HashMap::new())),
            unavailable: Arc::new(AtomicBool::new(false)),
            clears: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add or replace a component (keyed by ID)
    pub fn add_component(&self, component: Component) {
        let mut components = self.components.lock().unwrap_or_else(PoisonError::into_inner);
        components.retain(|c| c.id != component.id);
        components.push(component);
    }

    pub fn add_interface(&self, mac: &str, component_id: &str) {
        self.interfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(EthernetInterface {
                mac_address: mac.to_string(),
                ip_address: String::new(),
                component_id: component_id.to_string(),
                description: String::new(),
                interface_type: "Node".to_string(),
                last_update: None,
            });
    }

    /// Make every call fail with a 503 until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of times `method` was called
    pub fn call_count(&self, method: &str) -> u64 {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    pub fn clear_count(&self) -> u64 {
        self.clears.load(Ordering::SeqCst)
    }

    fn record(&self, method: &'static str) -> Result<(), HsmError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method)
            .or_insert(0) += 1;

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(HsmError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Build a component for tests
pub fn node_component(id: &str, role: &str, nid: Option<u32>) -> Component {
    Component {
        id: id.to_string(),
        component_type: "Node".to_string(),
        state: "Ready".to_string(),
        flag: "OK".to_string(),
        enabled: true,
        role: role.to_string(),
        sub_role: String::new(),
        nid,
        net_type: String::new(),
        arch: "X86".to_string(),
        class: String::new(),
        extra_properties: HashMap::new(),
        last_update_time: None,
    }
}

#[async_trait::async_trait]
impl HsmClientTrait for MockHsmClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_components(&self) -> Result<Arc<Vec<Component>>, HsmError> {
        self.record("get_components")?;
        let components = self.components.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::new(components.clone()))
    }

    async fn get_component(&self, id: &str) -> Result<Arc<Component>, HsmError> {
        self.record("get_component")?;
        self.components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(Arc::new)
            .ok_or_else(|| HsmError::NotFound(format!("component {id}")))
    }

    async fn get_ethernet_interfaces(&self) -> Result<Arc<Vec<EthernetInterface>>, HsmError> {
        self.record("get_ethernet_interfaces")?;
        let interfaces = self.interfaces.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::new(interfaces.clone()))
    }

    async fn get_component_by_mac(&self, mac: &str) -> Result<Arc<Component>, HsmError> {
        self.record("get_component_by_mac")?;
        let owner = self
            .interfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|iface| mac_eq(&iface.mac_address, mac))
            .map(|iface| iface.component_id.clone())
            .ok_or_else(|| HsmError::NotFound(format!("no component with MAC {mac}")))?;
        self.components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| c.id == owner)
            .cloned()
            .map(Arc::new)
            .ok_or_else(|| HsmError::NotFound(format!("component {owner}")))
    }

    async fn health(&self) -> Result<(), HsmError> {
        self.record("health")
    }

    fn clear_cache(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn stats(&self) -> ClientStats {
        let requests = self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum();
        ClientStats {
            base_url: self.base_url.clone(),
            cached_entries: 0,
            cache_expiry_secs: 0,
            requests,
            cache_hits: 0,
        }
    }
}
