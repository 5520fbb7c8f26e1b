//! HSM API models
//!
//! These models match the Hardware State Manager v2 JSON payloads, which use
//! PascalCase keys (`ID`, `NID`, `MACAddress`, ...).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Component model from `/hsm/v2/State/Components`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Component {
    /// Component xname (e.g., "x1000c0s0b0n0")
    #[serde(rename = "ID")]
    pub id: String,
    /// Component type ("Node", "RouterModule", ...)
    #[serde(rename = "Type", default)]
    pub component_type: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub flag: String,
    #[serde(default)]
    pub enabled: bool,
    /// Role ("Compute", "Application", "Management", ...)
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub sub_role: String,
    /// Numeric node ID
    #[serde(rename = "NID", default, skip_serializing_if = "Option::is_none")]
    pub nid: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub net_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra_properties: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
}

/// Response wrapper for the components listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentsResponse {
    #[serde(rename = "Components", default)]
    pub components: Vec<Component>,
}

/// Ethernet interface from `/hsm/v2/Inventory/EthernetInterfaces`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthernetInterface {
    #[serde(rename = "MACAddress")]
    pub mac_address: String,
    #[serde(rename = "IPAddress", default, skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
    /// xname of the component owning this interface
    #[serde(rename = "ComponentID", default)]
    pub component_id: String,
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Type of the owning component
    #[serde(rename = "Type", default, skip_serializing_if = "String::is_empty")]
    pub interface_type: String,
    #[serde(rename = "LastUpdate", default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
}

/// Response wrapper for the ethernet interface listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthernetInterfacesResponse {
    #[serde(rename = "EthernetInterfaces", default)]
    pub ethernet_interfaces: Vec<EthernetInterface>,
}

/// Compares two MAC addresses ignoring case and separators.
pub fn mac_eq(a: &str, b: &str) -> bool {
    let strip = |mac: &str| -> String {
        mac.chars()
            .filter(|c| c.is_ascii_hexdigit())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    };
    let (a, b) = (strip(a), strip(b));
    !a.is_empty() && a == b
}
