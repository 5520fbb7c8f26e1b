//! Provider to store synchronization
//!
//! Each cycle lists the provider's nodes, keeps the boot-relevant ones and
//! creates, updates or skips the matching store node. A failed cycle is
//! logged and retried on the next tick.

use crate::cache::ScriptCache;
use crate::error::SyncError;
use crate::models::Node;
use crate::provider::NodeProvider;
use crate::store::NodeStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Synchronizer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between cycles
    pub interval_secs: u64,
    /// Roles that boot from this service, compared case-insensitively
    pub roles: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            roles: vec!["Compute".to_string(), "Application".to_string()],
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Outcome of one synchronization cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Whether a stored node differs from the provider's view
///
/// Only fields the provider knows about are compared; a provider that lacks
/// a MAC or NID never clears the stored one.
pub fn needs_update(existing: &Node, desired: &Node) -> bool {
    existing.role != desired.role
        || existing.sub_role != desired.sub_role
        || (desired.boot_mac.is_some() && existing.canonical_mac() != desired.canonical_mac())
        || (desired.nid.is_some() && existing.nid != desired.nid)
}

/// Periodically reconciles provider inventory into the node store
pub struct NodeSynchronizer {
    provider: Arc<dyn NodeProvider>,
    store: Arc<dyn NodeStore>,
    cache: Option<Arc<ScriptCache>>,
    config: SyncConfig,
}

impl std::fmt::Debug for NodeSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSynchronizer")
            .field("provider", &self.provider.provider_type())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Store nodes indexed by their unique fields
#[derive(Default)]
struct OwnerIndex {
    by_xname: HashMap<String, Node>,
    nid_owner: HashMap<u32, String>,
    mac_owner: HashMap<String, String>,
}

impl OwnerIndex {
    fn new(nodes: Vec<Node>) -> Self {
        let mut index = Self::default();
        for node in nodes {
            index.insert(node);
        }
        index
    }

    fn insert(&mut self, node: Node) {
        if let Some(nid) = node.nid {
            self.nid_owner.insert(nid, node.xname.clone());
        }
        if let Some(mac) = node.canonical_mac() {
            self.mac_owner.insert(mac, node.xname.clone());
        }
        self.by_xname.insert(node.xname.clone(), node);
    }

    fn remove(&mut self, xname: &str) {
        if let Some(node) = self.by_xname.remove(xname) {
            if let Some(nid) = node.nid {
                self.nid_owner.remove(&nid);
            }
            if let Some(mac) = node.canonical_mac() {
                self.mac_owner.remove(&mac);
            }
        }
    }

    /// Another node already owning the desired NID or MAC
    fn conflict(&self, desired: &Node) -> Option<String> {
        if let Some(nid) = desired.nid {
            if let Some(owner) = self.nid_owner.get(&nid).filter(|o| **o != desired.xname) {
                return Some(format!("NID {nid} already owned by {owner}"));
            }
        }
        if let Some(mac) = desired.canonical_mac() {
            if let Some(owner) = self.mac_owner.get(&mac).filter(|o| **o != desired.xname) {
                return Some(format!("MAC {mac} already owned by {owner}"));
            }
        }
        None
    }
}

impl NodeSynchronizer {
    pub fn new(
        provider: Arc<dyn NodeProvider>,
        store: Arc<dyn NodeStore>,
        cache: Option<Arc<ScriptCache>>,
        config: SyncConfig,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn is_boot_relevant(&self, component_type: &str, role: &str) -> bool {
        component_type.eq_ignore_ascii_case("Node")
            && self.config.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    /// Run one synchronization cycle
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let components = self.provider.list_all().await?;
        let total = components.len();
        let relevant: Vec<Node> = components
            .iter()
            .filter(|c| self.is_boot_relevant(&c.component_type, &c.role))
            .map(|c| c.to_node())
            .collect();
        debug!(
            "{} of {} {} provider components are boot-relevant",
            relevant.len(),
            total,
            self.provider.provider_type()
        );

        let mut index = OwnerIndex::new(self.store.list_nodes().await?);
        let mut report = SyncReport::default();

        for desired in relevant {
            if let Err(e) = desired.validate() {
                warn!("Skipping provider node: {}", e);
                report.failed += 1;
                continue;
            }
            if let Some(conflict) = index.conflict(&desired) {
                warn!("Skipping provider node {}: {}", desired.xname, conflict);
                report.skipped += 1;
                continue;
            }

            match index.by_xname.get(&desired.xname).cloned() {
                None => match self.store.create_node(desired.clone()).await {
                    Ok(created) => {
                        debug!("Created node {} from provider", created.xname);
                        index.insert(created);
                        report.created += 1;
                    }
                    Err(e) => {
                        warn!("Failed to create node {}: {}", desired.xname, e);
                        report.failed += 1;
                    }
                },
                Some(existing) if needs_update(&existing, &desired) => {
                    let mut updated = existing.clone();
                    updated.role = desired.role.clone();
                    updated.sub_role = desired.sub_role.clone();
                    if desired.boot_mac.is_some() {
                        updated.boot_mac = desired.boot_mac.clone();
                    }
                    if desired.nid.is_some() {
                        updated.nid = desired.nid;
                    }

                    match self.store.update_node(&existing.uid, updated).await {
                        Ok(updated) => {
                            debug!("Updated node {} from provider", updated.xname);
                            if let Some(cache) = &self.cache {
                                cache.invalidate_by_node(&updated.xname);
                            }
                            index.remove(&existing.xname);
                            index.insert(updated);
                            report.updated += 1;
                        }
                        Err(e) => {
                            warn!("Failed to update node {}: {}", existing.xname, e);
                            report.failed += 1;
                        }
                    }
                }
                Some(_) => report.skipped += 1,
            }
        }

        info!(
            "Node sync complete: {} created, {} updated, {} skipped, {} failed",
            report.created, report.updated, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Sync immediately, then every interval until cancelled
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            "Node synchronizer started ({} provider, every {:?})",
            self.provider.provider_type(),
            self.config.interval()
        );

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                () = token.cancelled() => break,
                result = self.sync() => {
                    if let Err(e) = result {
                        error!("Node sync failed, retrying next cycle: {}", e);
                    }
                }
            }
        }
        info!("Node synchronizer stopped");
    }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
