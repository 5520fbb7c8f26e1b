//! Boot script service
//!
//! Entry point of the engine: validates the identifier, serves from the
//! script cache, resolves the node, matches a configuration and renders. Any
//! failure past input validation degrades to the minimal or error script.

use crate::cache::{cache_key, ScriptCache};
use crate::error::BootError;
use crate::matcher::match_configuration;
use crate::provider::NodeProvider;
use crate::renderer::ScriptRenderer;
use crate::resolver::NodeResolver;
use crate::store::NodeStore;
use crate::validation::{canonical_identifier, validate_identifier};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct BootScriptService {
    store: Arc<dyn NodeStore>,
    provider: Option<Arc<dyn NodeProvider>>,
    resolver: NodeResolver,
    renderer: ScriptRenderer,
    cache: Arc<ScriptCache>,
}

impl std::fmt::Debug for BootScriptService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootScriptService")
            .field("provider", &self.provider_type())
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

impl BootScriptService {
    pub fn new(
        store: Arc<dyn NodeStore>,
        provider: Option<Arc<dyn NodeProvider>>,
        cache: Arc<ScriptCache>,
        renderer: ScriptRenderer,
    ) -> Self {
        Self {
            resolver: NodeResolver::new(Arc::clone(&store), provider.clone()),
            store,
            provider,
            renderer,
            cache,
        }
    }

    /// Bound provider lookups below the HTTP request timeout
    #[must_use]
    pub fn with_provider_timeout(self, timeout: Duration) -> Self {
        Self {
            resolver: self.resolver.with_provider_timeout(timeout),
            ..self
        }
    }

    pub fn cache(&self) -> &Arc<ScriptCache> {
        &self.cache
    }

    /// `"hsm"`, `"file"` or `"none"`
    pub fn provider_type(&self) -> &'static str {
        self.provider.as_ref().map_or("none", |p| p.provider_type())
    }

    /// Boot script for `identifier` (xname, NID or MAC)
    ///
    /// Only malformed input is an error; unknown nodes and backend failures
    /// still produce a script.
    pub async fn generate_boot_script(&self, identifier: &str) -> Result<String, BootError> {
        validate_identifier(identifier).map_err(BootError::Invalid)?;
        let identifier = canonical_identifier(identifier);
        let key = cache_key(&identifier, None);

        if let Some(script) = self.cache.get(&key) {
            return Ok(script.to_string());
        }

        let Some(resolved) = self.resolver.resolve(&identifier).await else {
            info!("No node found for {}, serving error script", identifier);
            return Ok(self.renderer.render_error(&identifier, "node not found"));
        };
        let node = resolved.node;

        let configs = match self.store.list_boot_configurations().await {
            Ok(configs) => configs,
            Err(e) => {
                warn!("Failed to list boot configurations for {}: {}", node.xname, e);
                Vec::new()
            }
        };
        let matched = match_configuration(&node, &configs);
        let config = matched.map(|m| m.config);

        match self.renderer.render(&identifier, Some(&node), config) {
            Ok(script) => {
                if let Some(config) = config {
                    self.cache.set(key, script.as_str(), &node.xname, &config.name);
                    debug!(
                        "Rendered boot script for {} ({:?}) with {}",
                        node.xname, resolved.source, config.name
                    );
                } else {
                    info!("No boot configuration matches {}, serving minimal script", node.xname);
                }
                Ok(script)
            }
            Err(e) => {
                error!("Failed to render boot script for {}: {}", node.xname, e);
                Ok(self.renderer.render_error(&identifier, &e.to_string()))
            }
        }
    }

    /// Drop cached scripts of a node after it changed
    pub fn invalidate_for_node(&self, node_id: &str) -> usize {
        let removed = self.cache.invalidate_by_node(node_id);
        debug!("Invalidated {} cached scripts for node {}", removed, node_id);
        removed
    }

    /// Drop cached scripts rendered from a configuration after it changed
    pub fn invalidate_for_config(&self, config_id: &str) -> usize {
        let removed = self.cache.invalidate_by_config(config_id);
        debug!("Invalidated {} cached scripts for configuration {}", removed, config_id);
        removed
    }

    pub async fn health_check(&self) -> Result<(), BootError> {
        self.store
            .list_boot_configurations()
            .await
            .map_err(|e| BootError::Unavailable(format!("node store: {e}")))?;
        if let Some(provider) = &self.provider {
            provider
                .health_check()
                .await
                .map_err(|e| BootError::Unavailable(format!("{} provider: {e}", provider.provider_type())))?;
        }
        Ok(())
    }

    pub fn stats(&self) -> Map<String, Value> {
        let mut stats = Map::new();
        stats.insert("provider_type".to_string(), self.provider_type().into());
        stats.insert("provider_configured".to_string(), self.provider.is_some().into());
        stats.insert("sync_supported".to_string(), self.provider.is_some().into());
        stats.insert("cache".to_string(), json!(self.cache.stats()));
        stats.insert("cache_ttl_secs".to_string(), self.cache.ttl().as_secs().into());
        if let Some(provider) = &self.provider {
            stats.insert("provider".to_string(), Value::Object(provider.stats()));
        }
        stats
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
