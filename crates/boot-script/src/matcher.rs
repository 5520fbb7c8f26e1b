//! Boot configuration matching
//!
//! Every configuration is scored against the node:
//!
//! | Criterion                              | Points       |
//! |----------------------------------------|--------------|
//! | boot MAC listed in `macs`              | 100          |
//! | NID listed in `nids`                   | 75           |
//! | xname matches a `hosts` pattern        | 50           |
//! | each group shared with `groups`        | 25 per group |
//! | no selectors at all (default config)   | 1            |
//! | `hosts` lists `default`, nothing else  | 1            |
//!
//! The configuration's `priority` is added to the total. A configuration with
//! selectors of which none match is not eligible, unless its hosts include
//! the `default` keyword. The highest total wins and
//! an exact tie keeps the configuration listed first.

use crate::models::{BootConfiguration, Node};
use crate::validation::{normalize_mac, DEFAULT_HOST};
use std::collections::HashSet;
use tracing::{debug, warn};

pub const MAC_SCORE: i64 = 100;
pub const NID_SCORE: i64 = 75;
pub const HOST_SCORE: i64 = 50;
pub const GROUP_SCORE: i64 = 25;
pub const DEFAULT_SCORE: i64 = 1;

/// Winning configuration and its total score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigMatch<'a> {
    pub config: &'a BootConfiguration,
    pub score: i64,
}

fn host_matches(pattern: &str, xname: &str) -> bool {
    if pattern == DEFAULT_HOST {
        return false;
    }
    if pattern == xname {
        return true;
    }
    pattern.contains(['*', '?'])
        && glob::Pattern::new(pattern).is_ok_and(|p| p.matches(xname))
}

/// Score of `config` for `node`, or `None` when not eligible
pub fn score(node: &Node, config: &BootConfiguration) -> Option<i64> {
    if !config.has_selectors() {
        return Some(DEFAULT_SCORE + config.priority);
    }

    let mut criteria = 0;

    if let Some(mac) = node.canonical_mac() {
        if config
            .macs
            .iter()
            .any(|m| normalize_mac(m).as_deref() == Some(mac.as_str()))
        {
            criteria += MAC_SCORE;
        }
    }

    if node.nid.is_some_and(|nid| config.nids.contains(&nid)) {
        criteria += NID_SCORE;
    }

    if config.hosts.iter().any(|h| host_matches(h, &node.xname)) {
        criteria += HOST_SCORE;
    }

    let node_groups: HashSet<&str> = node.groups.iter().map(String::as_str).collect();
    let shared = config
        .groups
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>()
        .intersection(&node_groups)
        .count();
    criteria += GROUP_SCORE * i64::try_from(shared).unwrap_or_default();

    if criteria > 0 {
        Some(criteria + config.priority)
    } else if config.hosts.iter().any(|h| h == DEFAULT_HOST) {
        Some(DEFAULT_SCORE + config.priority)
    } else {
        None
    }
}

/// Pick the best configuration for `node`
///
/// Configurations failing validation are skipped with a warning. Returns
/// `None` when nothing is eligible.
pub fn match_configuration<'a>(node: &Node, configs: &'a [BootConfiguration]) -> Option<ConfigMatch<'a>> {
    let mut best: Option<ConfigMatch<'a>> = None;

    for config in configs {
        if let Err(e) = config.validate() {
            warn!("Skipping invalid boot configuration: {}", e);
            continue;
        }
        let Some(score) = score(node, config) else {
            continue;
        };
        // Strictly greater keeps the earliest configuration on ties
        if best.is_none_or(|b| score > b.score) {
            best = Some(ConfigMatch { config, score });
        }
    }

    if let Some(m) = &best {
        debug!("Node {} matched configuration {} (score {})", node.xname, m.config.name, m.score);
    }
    best
}

#[cfg(test)]
#[path = "matcher_test.rs"]
mod tests;
