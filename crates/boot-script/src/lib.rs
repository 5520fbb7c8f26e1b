//! Boot Script Engine
//!
//! Resolves network-boot requests from bare-metal nodes into rendered iPXE
//! scripts:
//! - Node identity resolution across xname, NID and boot MAC
//! - Pluggable node providers (remote HSM inventory or a declarative YAML file)
//! - Priority-scored boot configuration matching with a stable tie-break
//! - Default, minimal and error iPXE templates
//! - TTL script cache with selective invalidation and a background sweeper
//! - Background provider -> store synchronization
//!
//! The engine degrades rather than fails: an unknown node, an unreachable
//! provider or a broken configuration still yields a script the firmware can
//! execute and retry from.

pub mod cache;
pub mod error;
pub mod matcher;
pub mod models;
pub mod provider;
pub mod renderer;
pub mod resolver;
pub mod service;
pub mod store;
pub mod sync;
pub mod validation;
pub mod workers;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cache::{cache_key, CacheConfig, CacheStats, ScriptCache};
pub use error::*;
pub use matcher::{match_configuration, ConfigMatch};
pub use models::*;
pub use provider::{build_provider, NodeProvider, ProviderConfig};
pub use renderer::{extract_filename, RendererConfig, ScriptRenderer, IPXE_HEADER};
pub use resolver::{NodeResolver, NodeSource, ResolvedNode};
pub use service::BootScriptService;
pub use store::{MemoryNodeStore, NodeStore};
pub use sync::{NodeSynchronizer, SyncConfig, SyncReport};
pub use workers::BackgroundWorkers;
