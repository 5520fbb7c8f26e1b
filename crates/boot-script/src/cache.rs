//! Rendered script cache
//!
//! Entries are keyed `identifier:configName` and expire a fixed TTL after
//! they are stored. Expired entries are dropped on read and by a background
//! sweeper that wakes every TTL/2.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Longest entry lifetime; larger TTLs are clamped
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Config name used in keys when a request carries none
pub const DEFAULT_CONFIG_KEY: &str = "default";

/// Cache key for an identifier and optional configuration name
pub fn cache_key(identifier: &str, config_name: Option<&str>) -> String {
    let config = match config_name {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_CONFIG_KEY,
    };
    format!("{identifier}:{config}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    script: Arc<str>,
    generated_at: Instant,
    expires_at: Instant,
    node_id: String,
    config_id: String,
}

/// Entry counts; `expired` entries are still stored but no longer served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
}

/// TTL cache of rendered boot scripts
#[derive(Debug)]
pub struct ScriptCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ScriptCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: ttl.min(MAX_TTL),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Script for `key` if stored and not expired
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if Instant::now() < entry.expires_at => {
                    debug!(
                        "Script cache hit for {} (age {:?})",
                        key,
                        entry.generated_at.elapsed()
                    );
                    return Some(Arc::clone(&entry.script));
                }
                None => return None,
                Some(_) => {}
            }
        }

        // Expired: drop it unless another writer refreshed it meanwhile
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(key)
            .is_some_and(|entry| Instant::now() >= entry.expires_at)
        {
            entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, script: impl Into<Arc<str>>, node_id: &str, config_id: &str) {
        let now = Instant::now();
        let entry = CacheEntry {
            script: script.into(),
            generated_at: now,
            expires_at: now + self.ttl,
            node_id: node_id.to_string(),
            config_id: config_id.to_string(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), entry);
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Drop every entry owned by `node_id` or keyed under it
    pub fn invalidate_by_node(&self, node_id: &str) -> usize {
        let prefix = format!("{node_id}:");
        self.remove_where(|key, entry| entry.node_id == node_id || key.starts_with(&prefix))
    }

    /// Drop every entry rendered from `config_id`
    pub fn invalidate_by_config(&self, config_id: &str) -> usize {
        self.remove_where(|key, entry| {
            entry.config_id == config_id || key.rsplit_once(':').is_some_and(|(_, c)| c == config_id)
        })
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let valid = entries.values().filter(|e| now < e.expires_at).count();
        CacheStats {
            total: entries.len(),
            valid,
            expired: entries.len() - valid,
        }
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        self.remove_where(|_, entry| now >= entry.expires_at)
    }

    fn remove_where(&self, mut predicate: impl FnMut(&str, &CacheEntry) -> bool) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, entry| !predicate(key, entry));
        before - entries.len()
    }

    /// Sweep expired entries every TTL/2 until cancelled
    pub async fn run_sweeper(self: Arc<Self>, token: CancellationToken) {
        let period = (self.ttl / 2).max(Duration::from_millis(10));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Script cache sweeper started (every {:?})", period);

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    info!("Script cache sweeper stopped");
                    return;
                }
                _ = interval.tick() => {
                    let removed = self.sweep_expired();
                    if removed > 0 {
                        debug!("Swept {} expired boot scripts", removed);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
