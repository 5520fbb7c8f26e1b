//! HSM API client
//!
//! Implements the read-only subset of the Hardware State Manager v2 API the
//! boot service needs:
//! - `/hsm/v2/State/Components`
//! - `/hsm/v2/State/Components/{xname}`
//! - `/hsm/v2/Inventory/EthernetInterfaces`
//! - `/hsm/v2/service/ready`

use crate::backoff::FibonacciBackoff;
use crate::cache::{component_key, CachedResponse, ResponseCache, ALL_COMPONENTS_KEY, ALL_ETHERNET_KEY};
use crate::error::HsmError;
use crate::hsm_trait::HsmClientTrait;
use crate::models::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const COMPONENTS_PATH: &str = "/hsm/v2/State/Components";
const ETHERNET_PATH: &str = "/hsm/v2/Inventory/EthernetInterfaces";
const READY_PATH: &str = "/hsm/v2/service/ready";

/// HSM client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HsmConfig {
    /// HSM base URL (e.g., "http://hsm:27779")
    pub base_url: String,
    /// Optional bearer token
    pub token: Option<String>,
    /// Per-request timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// First retry delay; later delays follow the Fibonacci sequence
    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,
    /// How long responses are served from the cache
    #[serde(with = "duration_secs")]
    pub cache_expiry: Duration,
}

impl Default for HsmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:27779".to_string(),
            token: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            cache_expiry: Duration::from_secs(300),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Client counters exposed through the provider stats
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientStats {
    pub base_url: String,
    pub cached_entries: usize,
    pub cache_expiry_secs: u64,
    pub requests: u64,
    pub cache_hits: u64,
}

/// HSM API client
#[derive(Debug)]
pub struct HsmClient {
    client: Client,
    base_url: String,
    config: HsmConfig,
    cache: ResponseCache,
    requests: AtomicU64,
    cache_hits: AtomicU64,
}

impl HsmClient {
    /// Create a new HSM client
    ///
    /// # Arguments
    /// * `config` - base URL, optional bearer token, timeouts and cache expiry
    pub fn new(config: HsmConfig) -> Result<Self, HsmError> {
        if config.base_url.trim().is_empty() {
            return Err(HsmError::InvalidRequest("HSM base URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache: ResponseCache::new(config.cache_expiry),
            config,
            requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &HsmConfig {
        &self.config
    }

    /// List all components, served from cache when fresh
    pub async fn get_components(&self) -> Result<Arc<Vec<Component>>, HsmError> {
        if let Some(CachedResponse::Components(components)) = self.cached(ALL_COMPONENTS_KEY) {
            return Ok(components);
        }

        let response: ComponentsResponse = self.get_json(COMPONENTS_PATH).await?;
        let components = Arc::new(response.components);
        debug!("Fetched {} components from HSM", components.len());
        self.cache
            .insert(ALL_COMPONENTS_KEY, CachedResponse::Components(Arc::clone(&components)));
        Ok(components)
    }

    /// Get a single component by xname
    pub async fn get_component(&self, id: &str) -> Result<Arc<Component>, HsmError> {
        if id.trim().is_empty() {
            return Err(HsmError::InvalidRequest("component ID is empty".to_string()));
        }

        let key = component_key(id);
        if let Some(CachedResponse::Component(component)) = self.cached(&key) {
            return Ok(component);
        }

        let path = format!("{}/{}", COMPONENTS_PATH, urlencoding::encode(id));
        let component: Arc<Component> = Arc::new(self.get_json(&path).await?);
        self.cache
            .insert(key, CachedResponse::Component(Arc::clone(&component)));
        Ok(component)
    }

    /// List all ethernet interfaces, served from cache when fresh
    pub async fn get_ethernet_interfaces(&self) -> Result<Arc<Vec<EthernetInterface>>, HsmError> {
        if let Some(CachedResponse::EthernetInterfaces(interfaces)) = self.cached(ALL_ETHERNET_KEY) {
            return Ok(interfaces);
        }

        // Older HSM releases return a bare array, newer ones wrap it
        let value: serde_json::Value = self.get_json(ETHERNET_PATH).await?;
        let interfaces = if value.is_array() {
            serde_json::from_value::<Vec<EthernetInterface>>(value)?
        } else {
            serde_json::from_value::<EthernetInterfacesResponse>(value)?.ethernet_interfaces
        };
        let interfaces = Arc::new(interfaces);
        debug!("Fetched {} ethernet interfaces from HSM", interfaces.len());
        self.cache.insert(
            ALL_ETHERNET_KEY,
            CachedResponse::EthernetInterfaces(Arc::clone(&interfaces)),
        );
        Ok(interfaces)
    }

    /// Find the component owning `mac`
    ///
    /// Two-step lookup: the interface listing yields the owning component ID,
    /// which is then fetched individually. MAC comparison ignores case and
    /// separators.
    pub async fn get_component_by_mac(&self, mac: &str) -> Result<Arc<Component>, HsmError> {
        let interfaces = self.get_ethernet_interfaces().await?;
        let owner = interfaces
            .iter()
            .find(|iface| mac_eq(&iface.mac_address, mac) && !iface.component_id.is_empty())
            .map(|iface| iface.component_id.clone())
            .ok_or_else(|| HsmError::NotFound(format!("no component with MAC {mac}")))?;

        self.get_component(&owner).await
    }

    /// Check HSM readiness. Bypasses the cache and does not retry.
    pub async fn health(&self) -> Result<(), HsmError> {
        let url = format!("{}{}", self.base_url, READY_PATH);
        self.requests.fetch_add(1, Ordering::Relaxed);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HsmError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// Drop all cached responses
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("HSM response cache cleared");
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            base_url: self.base_url.clone(),
            cached_entries: self.cache.len(),
            cache_expiry_secs: self.cache.expiry().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    fn cached(&self, key: &str) -> Option<CachedResponse> {
        let hit = self.cache.get(key);
        if hit.is_some() {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!("HSM cache hit: {}", key);
        }
        hit
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.config.token {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        }
    }

    /// GET with retries on transient failures
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HsmError> {
        let url = format!("{}{}", self.base_url, path);
        let mut backoff = FibonacciBackoff::new(
            self.config.retry_delay,
            self.config.retry_delay.saturating_mul(8),
        );
        let mut attempt = 0;

        loop {
            match self.fetch_once(&url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff.next_backoff();
                    warn!(
                        "HSM request {} failed (attempt {}/{}): {}, retrying in {:?}",
                        path,
                        attempt,
                        self.config.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once<T: DeserializeOwned>(&self, url: &str) -> Result<T, HsmError> {
        debug!("GET {}", url);
        self.requests.fetch_add(1, Ordering::Relaxed);

        let response = self.authorized(self.client.get(url)).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(HsmError::NotFound(url.to_string()));
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(HsmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl HsmClientTrait for HsmClient {
    fn base_url(&self) -> &str {
        self.base_url()
    }

    async fn get_components(&self) -> Result<Arc<Vec<Component>>, HsmError> {
        self.get_components().await
    }

    async fn get_component(&self, id: &str) -> Result<Arc<Component>, HsmError> {
        self.get_component(id).await
    }

    async fn get_ethernet_interfaces(&self) -> Result<Arc<Vec<EthernetInterface>>, HsmError> {
        self.get_ethernet_interfaces().await
    }

    async fn get_component_by_mac(&self, mac: &str) -> Result<Arc<Component>, HsmError> {
        self.get_component_by_mac(mac).await
    }

    async fn health(&self) -> Result<(), HsmError> {
        self.health().await
    }

    fn clear_cache(&self) {
        self.clear_cache();
    }

    fn stats(&self) -> ClientStats {
        self.stats()
    }
}
