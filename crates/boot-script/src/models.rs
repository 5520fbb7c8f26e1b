//! Boot engine data model
//!
//! `Node` and `BootConfiguration` are owned by the external store; the engine
//! only reads them on the boot path. `InventoryComponent` is the transient
//! provider shape converted into a `Node` on fallback or during sync.

use crate::validation::{is_valid_host_pattern, is_valid_url_or_path, is_valid_xname, normalize_mac};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bootable cluster node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    /// Store-assigned identifier (empty until persisted)
    pub uid: String,
    /// Hardware-location name, primary key
    pub xname: String,
    /// Numeric node ID, unique when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nid: Option<u32>,
    /// Boot MAC in canonical lower-case colon form, unique when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_mac: Option<String>,
    pub role: String,
    pub sub_role: String,
    pub hostname: String,
    pub groups: Vec<String>,
    /// Lifecycle state ("Ready", "On", ...)
    pub state: String,
}

impl Node {
    /// Create a node with just its xname set
    pub fn new(xname: impl Into<String>) -> Self {
        Self {
            xname: xname.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_xname(&self.xname) {
            return Err(format!("invalid xname '{}'", self.xname));
        }
        if let Some(mac) = &self.boot_mac {
            if normalize_mac(mac).is_none() {
                return Err(format!("invalid boot MAC '{mac}' for {}", self.xname));
            }
        }
        Ok(())
    }

    /// Boot MAC in canonical form, if present and well-formed
    pub fn canonical_mac(&self) -> Option<String> {
        self.boot_mac.as_deref().and_then(normalize_mac)
    }
}

/// A boot configuration and its node selectors
///
/// A configuration without any selector is a default that matches every node
/// at the lowest score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfiguration {
    pub name: String,
    /// xname patterns, exact or wildcard
    pub hosts: Vec<String>,
    pub macs: Vec<String>,
    pub nids: Vec<u32>,
    pub groups: Vec<String>,
    pub kernel: String,
    pub initrd: String,
    pub params: String,
    pub priority: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl BootConfiguration {
    pub fn has_selectors(&self) -> bool {
        !(self.hosts.is_empty() && self.macs.is_empty() && self.nids.is_empty() && self.groups.is_empty())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("boot configuration name is empty".to_string());
        }
        if !is_valid_url_or_path(&self.kernel) {
            return Err(format!("{}: invalid kernel '{}'", self.name, self.kernel));
        }
        if !self.initrd.is_empty() && !is_valid_url_or_path(&self.initrd) {
            return Err(format!("{}: invalid initrd '{}'", self.name, self.initrd));
        }
        if let Some(mac) = self.macs.iter().find(|m| normalize_mac(m).is_none()) {
            return Err(format!("{}: invalid MAC selector '{mac}'", self.name));
        }
        if let Some(host) = self.hosts.iter().find(|h| !is_valid_host_pattern(h)) {
            return Err(format!("{}: invalid host selector '{host}'", self.name));
        }
        Ok(())
    }
}

/// Provider-side node shape, never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryComponent {
    /// Provider primary identifier
    pub id: String,
    pub xname: String,
    pub component_type: String,
    pub role: String,
    pub sub_role: String,
    pub state: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_mac: Option<String>,
    /// Every known interface MAC
    pub macs: Vec<String>,
    pub hostname: String,
    pub groups: Vec<String>,
}

impl InventoryComponent {
    /// Boot MAC in canonical form, falling back to the first interface MAC
    pub fn primary_mac(&self) -> Option<String> {
        self.boot_mac
            .as_deref()
            .and_then(normalize_mac)
            .or_else(|| self.macs.iter().find_map(|m| normalize_mac(m)))
    }

    /// Transient node built from this component (uid left empty)
    pub fn to_node(&self) -> Node {
        let xname = if self.xname.is_empty() {
            self.id.clone()
        } else {
            self.xname.clone()
        };
        Node {
            uid: String::new(),
            xname,
            nid: self.nid,
            boot_mac: self.primary_mac(),
            role: self.role.clone(),
            sub_role: self.sub_role.clone(),
            hostname: self.hostname.clone(),
            groups: self.groups.clone(),
            state: self.state.clone(),
        }
    }
}
