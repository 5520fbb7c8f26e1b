//! Response cache for HSM queries
//!
//! Keys follow the inventory service's resource layout: `all_components`,
//! `component_<id>` and `all_ethernet`. Entries expire after a fixed duration
//! and are evicted lazily on read.

use crate::models::{Component, EthernetInterface};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Longest entry lifetime; larger expiries are clamped
pub const MAX_EXPIRY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Key for the full component listing
pub const ALL_COMPONENTS_KEY: &str = "all_components";
/// Key for the full ethernet interface listing
pub const ALL_ETHERNET_KEY: &str = "all_ethernet";

/// Key for a single component
pub fn component_key(id: &str) -> String {
    format!("component_{id}")
}

/// A cached HSM response
#[derive(Debug, Clone)]
pub enum CachedResponse {
    Components(Arc<Vec<Component>>),
    Component(Arc<Component>),
    EthernetInterfaces(Arc<Vec<EthernetInterface>>),
}

#[derive(Debug)]
struct Entry {
    data: CachedResponse,
    expires_at: Instant,
}

/// Thread-safe expiring cache of HSM responses
#[derive(Debug)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, Entry>>,
    expiry: Duration,
}

impl ResponseCache {
    pub fn new(expiry: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            expiry: expiry.min(MAX_EXPIRY),
        }
    }

    /// Configured entry lifetime
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Returns the entry if present and unexpired; expired entries are removed.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if Instant::now() < entry.expires_at => {
                    return Some(entry.data.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(key)
            .is_some_and(|entry| Instant::now() >= entry.expires_at)
        {
            entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: impl Into<String>, data: CachedResponse) {
        let entry = Entry {
            data,
            expires_at: Instant::now() + self.expiry,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), entry);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
