//! Hardware State Manager (HSM) REST API Client
//!
//! A Rust client library for the cluster hardware inventory service.
//! Provides type-safe models for components and ethernet interfaces, plus an
//! in-memory response cache so that repeated boot-time lookups do not hammer
//! the inventory service.
//!
//! # Example
//!
//! ```no_run
//! use hsm_client::{HsmClient, HsmConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HsmConfig {
//!     base_url: "http://hsm:27779".to_string(),
//!     ..HsmConfig::default()
//! };
//! let client = HsmClient::new(config)?;
//!
//! // All components (cached for `cache_expiry`)
//! let components = client.get_components().await?;
//!
//! // Single component by xname
//! let node = client.get_component("x1000c0s0b0n0").await?;
//!
//! // Two-step MAC lookup: interfaces -> owning component -> component
//! let by_mac = client.get_component_by_mac("a4:bf:01:00:00:01").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Response Cache**: `all_components`, `component_<id>` and `all_ethernet`
//!   responses are kept until `cache_expiry` elapses
//! - **Bearer Authentication**: optional token attached to every request
//! - **Retry Logic**: transient failures are retried with Fibonacci backoff
//! - **Mocking**: `MockHsmClient` behind the `test-util` feature

pub mod backoff;
pub mod cache;
pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod hsm_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use cache::{CachedResponse, ResponseCache};
pub use client::{ClientStats, HsmClient, HsmConfig};
pub use error::HsmError;
pub use models::*;
pub use hsm_trait::HsmClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{node_component, MockHsmClient};
