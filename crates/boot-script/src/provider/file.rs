//! Declarative YAML nodes file provider
//!
//! The file is parsed into a single index keyed by every identifier of every
//! node (id, xname, boot MAC, interface MACs, NID), with all keys of a node
//! sharing one `Arc`. When auto-reload is on, the file is re-parsed whenever
//! its modification time or size changes. A failed re-parse keeps serving the
//! last good index.

use super::NodeProvider;
use crate::error::ProviderError;
use crate::models::InventoryComponent;
use crate::validation::normalize_mac;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// File provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileProviderConfig {
    /// Path of the YAML nodes document
    pub path: PathBuf,
    /// Pick up edits without restart
    #[serde(default = "default_auto_reload")]
    pub auto_reload: bool,
}

fn default_auto_reload() -> bool {
    true
}

/// Top-level nodes document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodesDocument {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub nodes: Vec<FileNode>,
}

/// A node entry in the nodes document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNode {
    pub id: String,
    pub xname: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub role: String,
    #[serde(rename = "subrole")]
    pub sub_role: String,
    pub state: String,
    pub enabled: bool,
    pub nid: Option<u32>,
    pub boot_mac: Option<String>,
    pub hostname: String,
    pub groups: Vec<String>,
    pub ethernet_interfaces: Vec<FileInterface>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileInterface {
    pub mac_address: String,
    pub ip_address: String,
    pub description: String,
}

impl FileNode {
    fn primary_id(&self) -> &str {
        if self.id.is_empty() { &self.xname } else { &self.id }
    }

    fn to_component(&self) -> InventoryComponent {
        let macs: Vec<String> = self
            .ethernet_interfaces
            .iter()
            .filter_map(|iface| normalize_mac(&iface.mac_address))
            .collect();
        InventoryComponent {
            id: self.primary_id().to_string(),
            xname: if self.xname.is_empty() { self.id.clone() } else { self.xname.clone() },
            component_type: self.node_type.clone(),
            role: self.role.clone(),
            sub_role: self.sub_role.clone(),
            state: self.state.clone(),
            enabled: self.enabled,
            nid: self.nid.filter(|nid| *nid > 0),
            boot_mac: self.boot_mac.as_deref().and_then(normalize_mac),
            macs,
            hostname: self.hostname.clone(),
            groups: self.groups.clone(),
        }
    }

    /// Every lookup key of this node
    fn keys(&self, component: &InventoryComponent) -> Vec<String> {
        let mut keys = Vec::new();
        for key in [&self.id, &self.xname] {
            if !key.is_empty() {
                keys.push(key.clone());
            }
        }
        keys.extend(component.boot_mac.iter().cloned());
        keys.extend(component.macs.iter().cloned());
        if let Some(nid) = component.nid {
            keys.push(nid.to_string());
        }
        keys.sort();
        keys.dedup();
        keys
    }
}

/// File identity used to detect edits
type Fingerprint = (Option<SystemTime>, u64);

#[derive(Debug, Default)]
struct FileIndex {
    by_key: HashMap<String, Arc<InventoryComponent>>,
    /// Unique nodes in file order
    nodes: Vec<Arc<InventoryComponent>>,
    ambiguous_keys: usize,
    version: String,
    fingerprint: Option<Fingerprint>,
    loaded_at: Option<DateTime<Utc>>,
}

impl FileIndex {
    fn build(document: NodesDocument, fingerprint: Fingerprint) -> Self {
        let mut index = FileIndex {
            version: document.version,
            fingerprint: Some(fingerprint),
            loaded_at: Some(Utc::now()),
            ..FileIndex::default()
        };
        let mut seen = HashSet::new();
        let mut poisoned = HashSet::new();

        for node in &document.nodes {
            let primary = node.primary_id();
            if primary.is_empty() {
                warn!("Skipping node without id or xname in nodes file");
                continue;
            }
            if !seen.insert(primary.to_string()) {
                warn!("Duplicate node {} in nodes file, keeping the first entry", primary);
                continue;
            }

            let component = node.to_component();
            let keys = node.keys(&component);
            let component = Arc::new(component);
            index.nodes.push(Arc::clone(&component));

            for key in keys {
                if poisoned.contains(&key) {
                    continue;
                }
                match index.by_key.get(&key) {
                    Some(existing) if existing.id != component.id => {
                        warn!(
                            "Identifier {} claimed by both {} and {}, ignoring it",
                            key, existing.id, component.id
                        );
                        index.by_key.remove(&key);
                        poisoned.insert(key);
                        index.ambiguous_keys += 1;
                    }
                    Some(_) => {}
                    None => {
                        index.by_key.insert(key, Arc::clone(&component));
                    }
                }
            }
        }
        index
    }

    fn lookup(&self, identifier: &str) -> Option<Arc<InventoryComponent>> {
        self.by_key
            .get(identifier)
            .or_else(|| self.by_key.get(&identifier.to_ascii_lowercase()))
            .or_else(|| normalize_mac(identifier).and_then(|mac| self.by_key.get(&mac)))
            .cloned()
    }
}

/// Provider over a declarative YAML nodes file
#[derive(Debug)]
pub struct FileProvider {
    config: FileProviderConfig,
    index: RwLock<FileIndex>,
}

impl FileProvider {
    /// Load the nodes file; fails if the initial parse fails
    pub async fn new(config: FileProviderConfig) -> Result<Self, ProviderError> {
        let provider = Self {
            config,
            index: RwLock::new(FileIndex::default()),
        };
        let count = provider.reload().await?;
        info!(
            "File node provider initialized with {} nodes from {}",
            count,
            provider.config.path.display()
        );
        Ok(provider)
    }

    async fn fingerprint(&self) -> Option<Fingerprint> {
        let metadata = tokio::fs::metadata(&self.config.path).await.ok()?;
        Some((metadata.modified().ok(), metadata.len()))
    }

    /// Re-parse the file unconditionally
    ///
    /// On failure the previous index stays in place.
    pub async fn reload(&self) -> Result<usize, ProviderError> {
        let fingerprint = self.fingerprint().await.unwrap_or((None, 0));
        let content = tokio::fs::read_to_string(&self.config.path)
            .await
            .map_err(|e| {
                ProviderError::Unavailable(format!("reading {}: {}", self.config.path.display(), e))
            })?;
        let document: NodesDocument = serde_yaml::from_str(&content).map_err(|e| {
            ProviderError::Invalid(format!("parsing {}: {}", self.config.path.display(), e))
        })?;

        let index = FileIndex::build(document, fingerprint);
        let count = index.nodes.len();
        debug!(
            "Loaded {} nodes from {}, indexed {} keys",
            count,
            self.config.path.display(),
            index.by_key.len()
        );
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = index;
        Ok(count)
    }

    /// Re-parse when auto-reload is on and the file changed
    async fn refresh(&self) {
        if !self.config.auto_reload {
            return;
        }
        let current = self.fingerprint().await;
        let loaded = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fingerprint;
        // Without an mtime there is nothing to compare, so always re-parse
        let unchanged = matches!((current, loaded), (Some(now), Some(then)) if now.0.is_some() && now == then);
        if unchanged {
            return;
        }
        if let Err(e) = self.reload().await {
            warn!("Failed to reload nodes file, serving last good data: {}", e);
        }
    }

    /// Shared handle for a node by any of its identifiers
    pub async fn lookup(&self, identifier: &str) -> Option<Arc<InventoryComponent>> {
        self.refresh().await;
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(identifier.trim())
    }

    /// Nodes whose role matches, case-insensitive
    pub async fn nodes_by_role(&self, role: &str) -> Vec<InventoryComponent> {
        self.refresh().await;
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .nodes
            .iter()
            .filter(|n| n.role.eq_ignore_ascii_case(role))
            .map(|n| InventoryComponent::clone(n))
            .collect()
    }
}

#[async_trait::async_trait]
impl NodeProvider for FileProvider {
    fn provider_type(&self) -> &'static str {
        "file"
    }

    async fn get_by_identifier(&self, identifier: &str) -> Result<InventoryComponent, ProviderError> {
        self.lookup(identifier)
            .await
            .map(|node| InventoryComponent::clone(&node))
            .ok_or_else(|| ProviderError::NotFound(identifier.to_string()))
    }

    async fn list_all(&self) -> Result<Vec<InventoryComponent>, ProviderError> {
        self.refresh().await;
        Ok(self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .nodes
            .iter()
            .map(|n| InventoryComponent::clone(n))
            .collect())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let count = self.reload().await?;
        if count == 0 {
            return Err(ProviderError::Invalid(format!(
                "no nodes in {}",
                self.config.path.display()
            )));
        }
        Ok(())
    }

    fn stats(&self) -> serde_json::Map<String, serde_json::Value> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let mut roles: BTreeMap<String, usize> = BTreeMap::new();
        for node in &index.nodes {
            *roles.entry(node.role.clone()).or_default() += 1;
        }

        let mut stats = serde_json::Map::new();
        stats.insert("provider_type".to_string(), "file".into());
        stats.insert("yaml_file".to_string(), self.config.path.display().to_string().into());
        stats.insert("version".to_string(), index.version.clone().into());
        stats.insert(
            "last_loaded".to_string(),
            index.loaded_at.map(|t| t.to_rfc3339()).into(),
        );
        stats.insert("auto_reload".to_string(), self.config.auto_reload.into());
        stats.insert("total_nodes".to_string(), index.nodes.len().into());
        stats.insert("total_indexes".to_string(), index.by_key.len().into());
        stats.insert("ambiguous_keys".to_string(), index.ambiguous_keys.into());
        stats.insert("roles".to_string(), serde_json::json!(roles));
        stats
    }
}

#[cfg(test)]
#[path = "file_test.rs"]
mod tests;
