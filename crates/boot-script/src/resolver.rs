//! Node identity resolution
//!
//! Identifiers are tried against the store as an xname, then as a NID, then
//! as a boot MAC. On a full miss the active provider is asked and its answer
//! becomes a transient node. Errors from either side are logged and count as
//! a miss, and so does a provider lookup that outlives its time budget.

use crate::error::{ProviderError, StoreError};
use crate::models::Node;
use crate::provider::NodeProvider;
use crate::store::NodeStore;
use crate::validation::normalize_mac;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default upper bound on one provider lookup
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a resolved node came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSource {
    /// Authoritative store
    Store,
    /// Provider fallback, not persisted
    Provider,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode {
    pub node: Node,
    pub source: NodeSource,
}

pub struct NodeResolver {
    store: Arc<dyn NodeStore>,
    provider: Option<Arc<dyn NodeProvider>>,
    provider_timeout: Duration,
}

impl std::fmt::Debug for NodeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeResolver")
            .field("provider", &self.provider.as_ref().map(|p| p.provider_type()))
            .field("provider_timeout", &self.provider_timeout)
            .finish_non_exhaustive()
    }
}

/// Single match within one namespace; several matches are ambiguous
fn unique<'a>(
    namespace: &str,
    identifier: &str,
    mut matches: impl Iterator<Item = &'a Node>,
) -> Option<&'a Node> {
    let first = matches.next()?;
    let extra = matches.count();
    if extra > 0 {
        warn!(
            "Identifier {} matches {} nodes by {}, treating as ambiguous",
            identifier,
            extra + 1,
            namespace
        );
        return None;
    }
    Some(first)
}

impl NodeResolver {
    pub fn new(store: Arc<dyn NodeStore>, provider: Option<Arc<dyn NodeProvider>>) -> Self {
        Self {
            store,
            provider,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Bound each provider lookup; an expired lookup is a miss
    #[must_use]
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }

    pub fn provider(&self) -> Option<&Arc<dyn NodeProvider>> {
        self.provider.as_ref()
    }

    /// Resolve an identifier to a node, store first
    pub async fn resolve(&self, identifier: &str) -> Option<ResolvedNode> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }

        if let Some(node) = self.resolve_in_store(identifier).await {
            return Some(ResolvedNode {
                node,
                source: NodeSource::Store,
            });
        }

        self.resolve_in_provider(identifier).await.map(|node| ResolvedNode {
            node,
            source: NodeSource::Provider,
        })
    }

    async fn resolve_in_store(&self, identifier: &str) -> Option<Node> {
        // xnames are unique in the store, so the primary key needs no scan
        match self.store.get_node(identifier).await {
            Ok(node) => return Some(node),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => {
                warn!("Node store lookup for {} failed: {}", identifier, e);
                return None;
            }
        }

        let nid = identifier.parse::<u32>().ok();
        let mac = normalize_mac(identifier);
        if nid.is_none() && mac.is_none() {
            return None;
        }

        let nodes = match self.store.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!("Node store lookup for {} failed: {}", identifier, e);
                return None;
            }
        };

        if let Some(nid) = nid {
            if let Some(node) = unique("NID", identifier, nodes.iter().filter(|n| n.nid == Some(nid))) {
                return Some(node.clone());
            }
        }

        if let Some(mac) = mac {
            let by_mac = nodes
                .iter()
                .filter(|n| n.canonical_mac().as_deref() == Some(mac.as_str()));
            if let Some(node) = unique("MAC", identifier, by_mac) {
                return Some(node.clone());
            }
        }

        None
    }

    async fn resolve_in_provider(&self, identifier: &str) -> Option<Node> {
        let provider = self.provider.as_ref()?;
        let lookup = tokio::time::timeout(self.provider_timeout, provider.get_by_identifier(identifier))
            .await
            .unwrap_or_else(|_| {
                Err(ProviderError::Unavailable(format!(
                    "lookup timed out after {:?}",
                    self.provider_timeout
                )))
            });
        match lookup {
            Ok(component) => {
                let node = component.to_node();
                if node.xname.is_empty() {
                    warn!(
                        "{} provider returned a node without xname for {}",
                        provider.provider_type(),
                        identifier
                    );
                    return None;
                }
                debug!(
                    "Resolved {} to {} via {} provider",
                    identifier,
                    node.xname,
                    provider.provider_type()
                );
                Some(node)
            }
            Err(ProviderError::NotFound(_)) => {
                debug!("{} provider has no node for {}", provider.provider_type(), identifier);
                None
            }
            Err(e) => {
                warn!(
                    "{} provider lookup for {} failed: {}",
                    provider.provider_type(),
                    identifier,
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
