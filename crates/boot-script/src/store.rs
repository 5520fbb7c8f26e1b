//! Node and boot configuration store
//!
//! The authoritative store is external to the engine; `NodeStore` is the
//! narrow read/write contract the resolver, service and synchronizer use.
//! `MemoryNodeStore` is the in-process implementation used by the binary and
//! by tests.

use crate::error::StoreError;
use crate::models::{BootConfiguration, Node};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Trait for node store operations
///
/// Implementations must tolerate concurrent writers outside the engine.
#[async_trait::async_trait]
pub trait NodeStore: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>, StoreError>;

    /// Node by xname. Returns `StoreError::NotFound` when absent.
    async fn get_node(&self, xname: &str) -> Result<Node, StoreError>;

    /// Persist a new node; the store assigns `uid`.
    async fn create_node(&self, node: Node) -> Result<Node, StoreError>;

    /// Replace the node identified by `uid`.
    async fn update_node(&self, uid: &str, node: Node) -> Result<Node, StoreError>;

    /// Boot configurations in enumeration order
    async fn list_boot_configurations(&self) -> Result<Vec<BootConfiguration>, StoreError>;
}

/// In-memory node store
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    nodes: RwLock<Vec<Node>>,
    configurations: RwLock<Vec<BootConfiguration>>,
    unavailable: AtomicBool,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with boot configurations, order preserved
    pub fn with_boot_configurations(configurations: Vec<BootConfiguration>) -> Self {
        Self {
            configurations: RwLock::new(configurations),
            ..Self::default()
        }
    }

    /// Insert a node directly, bypassing validation and uid assignment
    pub async fn add_node(&self, node: Node) {
        self.nodes.write().await.push(node);
    }

    /// Add a configuration, replacing any with the same name in place
    pub async fn add_boot_configuration(&self, configuration: BootConfiguration) {
        let mut configurations = self.configurations.write().await;
        match configurations.iter_mut().find(|c| c.name == configuration.name) {
            Some(existing) => *existing = configuration,
            None => configurations.push(configuration),
        }
    }

    /// Make every call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store disabled".to_string()));
        }
        Ok(())
    }
}

/// Reject `node` if another node (other than `uid`) already owns one of its
/// unique fields.
fn check_unique(nodes: &[Node], node: &Node, uid: Option<&str>) -> Result<(), StoreError> {
    let mac = node.canonical_mac();
    for other in nodes.iter().filter(|n| Some(n.uid.as_str()) != uid) {
        if other.xname == node.xname {
            return Err(StoreError::Conflict(format!("xname {} already exists", node.xname)));
        }
        if node.nid.is_some() && other.nid == node.nid {
            return Err(StoreError::Conflict(format!(
                "NID {} already owned by {}",
                node.nid.unwrap_or_default(),
                other.xname
            )));
        }
        if mac.is_some() && other.canonical_mac() == mac {
            return Err(StoreError::Conflict(format!(
                "MAC {} already owned by {}",
                mac.as_deref().unwrap_or_default(),
                other.xname
            )));
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl NodeStore for MemoryNodeStore {
    async fn list_nodes(&self) -> Result<Vec<Node>, StoreError> {
        self.check_available()?;
        Ok(self.nodes.read().await.clone())
    }

    async fn get_node(&self, xname: &str) -> Result<Node, StoreError> {
        self.check_available()?;
        self.nodes
            .read()
            .await
            .iter()
            .find(|n| n.xname == xname)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(xname.to_string()))
    }

    async fn create_node(&self, mut node: Node) -> Result<Node, StoreError> {
        self.check_available()?;
        node.validate().map_err(StoreError::Invalid)?;

        let mut nodes = self.nodes.write().await;
        check_unique(&nodes, &node, None)?;
        node.uid = Uuid::new_v4().to_string();
        node.boot_mac = node.canonical_mac();
        debug!("Created node {} ({})", node.xname, node.uid);
        nodes.push(node.clone());
        Ok(node)
    }

    async fn update_node(&self, uid: &str, mut node: Node) -> Result<Node, StoreError> {
        self.check_available()?;
        node.validate().map_err(StoreError::Invalid)?;

        let mut nodes = self.nodes.write().await;
        check_unique(&nodes, &node, Some(uid))?;
        let existing = nodes
            .iter_mut()
            .find(|n| n.uid == uid)
            .ok_or_else(|| StoreError::NotFound(uid.to_string()))?;
        node.uid = uid.to_string();
        node.boot_mac = node.canonical_mac();
        *existing = node.clone();
        debug!("Updated node {} ({})", node.xname, uid);
        Ok(node)
    }

    async fn list_boot_configurations(&self) -> Result<Vec<BootConfiguration>, StoreError> {
        self.check_available()?;
        Ok(self.configurations.read().await.clone())
    }
}
