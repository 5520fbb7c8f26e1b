//! Service configuration.
//!
//! Loaded from an optional YAML file named by `BOOT_SERVICE_CONFIG`, then
//! overridden by environment variables:
//!
//! | Variable                   | Effect                                   |
//! |----------------------------|------------------------------------------|
//! | `BOOT_SERVICE_HOST`        | bind address                             |
//! | `BOOT_SERVICE_PORT`        | bind port                                |
//! | `HSM_URL`                  | use the HSM provider at this URL         |
//! | `HSM_TOKEN`                | bearer token for the HSM provider        |
//! | `HSM_SYNC_ENABLED`         | run the background synchronizer          |
//! | `HSM_SYNC_INTERVAL`        | sync interval in minutes                 |
//! | `NODES_FILE`               | use the YAML file provider at this path  |
//! | `NODES_FILE_AUTO_RELOAD`   | pick up nodes file edits                 |
//! | `BOOT_CONFIGURATIONS_FILE` | YAML boot configurations to serve        |
//! | `CACHE_TTL_SECONDS`        | script cache lifetime                    |

use crate::error::ServiceError;
use boot_script::{
    BootConfiguration, CacheConfig, ProviderConfig, RendererConfig, SyncConfig,
    provider::FileProviderConfig,
};
use hsm_client::HsmConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Environment variable naming the YAML configuration file
pub const CONFIG_PATH_ENV: &str = "BOOT_SERVICE_CONFIG";

/// Longest accepted script cache lifetime (one week)
pub const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on one HTTP request, in seconds
    pub request_timeout_secs: u64,
    /// Upper bound on one provider lookup, in seconds; below the request timeout
    pub provider_timeout_secs: u64,
    /// At most one provider; `None` serves from the store alone
    pub provider: Option<ProviderConfig>,
    pub sync_enabled: bool,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub renderer: RendererConfig,
    pub boot_configurations_file: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            provider_timeout_secs: 10,
            provider: None,
            sync_enabled: true,
            sync: SyncConfig::default(),
            cache: CacheConfig::default(),
            renderer: RendererConfig::default(),
            boot_configurations_file: None,
        }
    }
}

/// Boot configurations file layout
#[derive(Debug, Default, Deserialize)]
struct BootConfigurationsDocument {
    #[serde(default)]
    configurations: Vec<BootConfiguration>,
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, ServiceError> {
    value
        .trim()
        .parse()
        .map_err(|_| ServiceError::InvalidConfig(format!("{name}: cannot parse '{value}'")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ServiceError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ServiceError::InvalidConfig(format!("{name}: expected a boolean, got '{value}'"))),
    }
}

impl ServiceConfig {
    /// Load from `BOOT_SERVICE_CONFIG` and the process environment
    pub fn load() -> Result<Self, ServiceError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ServiceError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ServiceError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(host) = var("BOOT_SERVICE_HOST") {
            self.host = host.trim().to_string();
        }
        if let Some(port) = var("BOOT_SERVICE_PORT") {
            self.port = parse_env("BOOT_SERVICE_PORT", &port)?;
        }

        let hsm_url = var("HSM_URL");
        let nodes_file = var("NODES_FILE");
        if hsm_url.is_some() && nodes_file.is_some() {
            return Err(ServiceError::InvalidConfig(
                "HSM_URL and NODES_FILE are mutually exclusive".to_string(),
            ));
        }
        if let Some(url) = hsm_url {
            let mut hsm = match self.provider.take() {
                Some(ProviderConfig::Hsm(hsm)) => hsm,
                _ => HsmConfig::default(),
            };
            hsm.base_url = url.trim().to_string();
            self.provider = Some(ProviderConfig::Hsm(hsm));
        }
        if let Some(path) = nodes_file {
            self.provider = Some(ProviderConfig::File(FileProviderConfig {
                path: PathBuf::from(path.trim()),
                auto_reload: true,
            }));
        }

        if let Some(token) = var("HSM_TOKEN") {
            match &mut self.provider {
                Some(ProviderConfig::Hsm(hsm)) => hsm.token = Some(token.trim().to_string()),
                _ => {
                    return Err(ServiceError::InvalidConfig(
                        "HSM_TOKEN is set but the HSM provider is not configured".to_string(),
                    ));
                }
            }
        }
        if let Some(auto_reload) = var("NODES_FILE_AUTO_RELOAD") {
            let auto_reload = parse_bool("NODES_FILE_AUTO_RELOAD", &auto_reload)?;
            if let Some(ProviderConfig::File(file)) = &mut self.provider {
                file.auto_reload = auto_reload;
            }
        }

        if let Some(enabled) = var("HSM_SYNC_ENABLED") {
            self.sync_enabled = parse_bool("HSM_SYNC_ENABLED", &enabled)?;
        }
        if let Some(minutes) = var("HSM_SYNC_INTERVAL") {
            let minutes: u64 = parse_env("HSM_SYNC_INTERVAL", &minutes)?;
            self.sync.interval_secs = minutes.saturating_mul(60);
        }
        if let Some(path) = var("BOOT_CONFIGURATIONS_FILE") {
            self.boot_configurations_file = Some(PathBuf::from(path.trim()));
        }
        if let Some(ttl) = var("CACHE_TTL_SECONDS") {
            self.cache.ttl_secs = parse_env("CACHE_TTL_SECONDS", &ttl)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.host.trim().is_empty() {
            return Err(ServiceError::InvalidConfig("host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(ServiceError::InvalidConfig("port must be between 1 and 65535".to_string()));
        }
        if self.cache.ttl_secs == 0 || self.cache.ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ServiceError::InvalidConfig(format!(
                "cache TTL must be between 1 and {MAX_CACHE_TTL_SECS} seconds"
            )));
        }
        if self.provider_timeout_secs == 0 || self.provider_timeout_secs >= self.request_timeout_secs {
            return Err(ServiceError::InvalidConfig(format!(
                "provider timeout must be positive and below the {}s request timeout",
                self.request_timeout_secs
            )));
        }
        if self.sync_enabled && self.sync.interval_secs == 0 {
            return Err(ServiceError::InvalidConfig("sync interval must be positive".to_string()));
        }
        match &self.provider {
            Some(ProviderConfig::Hsm(hsm)) if hsm.base_url.trim().is_empty() => {
                Err(ServiceError::InvalidConfig("HSM base URL is empty".to_string()))
            }
            Some(ProviderConfig::File(file)) if file.path.as_os_str().is_empty() => {
                Err(ServiceError::InvalidConfig("nodes file path is empty".to_string()))
            }
            _ => Ok(()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }

    /// Whether the synchronizer should run
    pub fn sync_active(&self) -> bool {
        self.sync_enabled && self.provider.is_some()
    }

    /// Boot configurations from `boot_configurations_file`, if any
    pub fn load_boot_configurations(&self) -> Result<Vec<BootConfiguration>, ServiceError> {
        let Some(path) = &self.boot_configurations_file else {
            return Ok(Vec::new());
        };
        let contents = std::fs::read_to_string(path)?;
        let document: BootConfigurationsDocument = serde_yaml::from_str(&contents)?;
        info!(
            "Loaded {} boot configurations from {}",
            document.configurations.len(),
            path.display()
        );
        Ok(document.configurations)
    }

    pub fn log_summary(&self) {
        info!("Configuration:");
        info!("  Listen: {}:{}", self.host, self.port);
        match &self.provider {
            Some(ProviderConfig::Hsm(hsm)) => info!("  Provider: hsm ({})", hsm.base_url),
            Some(ProviderConfig::File(file)) => info!(
                "  Provider: file ({}, auto reload {})",
                file.path.display(),
                file.auto_reload
            ),
            None => info!("  Provider: none"),
        }
        if self.sync_active() {
            info!("  Sync: every {}s", self.sync.interval_secs);
        } else {
            info!("  Sync: disabled");
        }
        info!("  Cache TTL: {}s", self.cache.ttl_secs);
        info!(
            "  Timeouts: provider {}s, request {}s",
            self.provider_timeout_secs, self.request_timeout_secs
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.sync.interval_secs, 300);
        assert!(config.provider.is_none());
        assert!(!config.sync_active(), "no provider, nothing to sync");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let config = ServiceConfig::from_yaml(
            "port: 9000\nprovider:\n  type: hsm\n  base_url: http://hsm:27779\ncache:\n  ttl_secs: 60\n",
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0", "unset fields keep defaults");
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(matches!(config.provider, Some(ProviderConfig::Hsm(ref hsm)) if hsm.base_url == "http://hsm:27779"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServiceConfig::default();
        config
            .apply_overrides(env(&[
                ("BOOT_SERVICE_HOST", "127.0.0.1"),
                ("BOOT_SERVICE_PORT", "8081"),
                ("HSM_URL", "http://smd:27779"),
                ("HSM_TOKEN", "secret"),
                ("HSM_SYNC_INTERVAL", "10"),
                ("HSM_SYNC_ENABLED", "false"),
                ("CACHE_TTL_SECONDS", "120"),
                ("BOOT_CONFIGURATIONS_FILE", "/etc/boot/configs.yaml"),
            ]))
            .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8081);
        assert_eq!(config.sync.interval_secs, 600, "interval is given in minutes");
        assert!(!config.sync_enabled);
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(
            config.boot_configurations_file.as_deref(),
            Some(Path::new("/etc/boot/configs.yaml"))
        );
        match config.provider {
            Some(ProviderConfig::Hsm(hsm)) => {
                assert_eq!(hsm.base_url, "http://smd:27779");
                assert_eq!(hsm.token.as_deref(), Some("secret"));
            }
            other => panic!("expected hsm provider, got {other:?}"),
        }
    }

    #[test]
    fn test_nodes_file_override() {
        let mut config = ServiceConfig::default();
        config
            .apply_overrides(env(&[
                ("NODES_FILE", "/etc/boot/nodes.yaml"),
                ("NODES_FILE_AUTO_RELOAD", "no"),
            ]))
            .unwrap();
        assert_eq!(
            config.provider,
            Some(ProviderConfig::File(FileProviderConfig {
                path: PathBuf::from("/etc/boot/nodes.yaml"),
                auto_reload: false,
            }))
        );
        assert!(config.sync_active());
    }

    #[test]
    fn test_invalid_overrides() {
        let cases: &[&[(&str, &str)]] = &[
            &[("HSM_URL", "http://hsm"), ("NODES_FILE", "/nodes.yaml")],
            &[("BOOT_SERVICE_PORT", "70000")],
            &[("BOOT_SERVICE_PORT", "http")],
            &[("HSM_SYNC_ENABLED", "maybe")],
            &[("HSM_TOKEN", "secret")],
        ];
        for vars in cases {
            let mut config = ServiceConfig::default();
            assert!(
                matches!(config.apply_overrides(env(vars)), Err(ServiceError::InvalidConfig(_))),
                "{vars:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate() {
        let config = ServiceConfig {
            port: 0,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServiceConfig {
            cache: CacheConfig { ttl_secs: u64::MAX },
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err(), "huge TTL rejected");

        let config = ServiceConfig {
            provider_timeout_secs: 30,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err(), "provider lookups must finish before the request times out");

        let config = ServiceConfig {
            provider: Some(ProviderConfig::Hsm(HsmConfig {
                base_url: " ".to_string(),
                ..HsmConfig::default()
            })),
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_boot_configurations() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "configurations:\n  - name: compute\n    groups: [compute]\n    kernel: http://boot/vmlinuz\n    priority: 5\n",
        )
        .unwrap();
        let config = ServiceConfig {
            boot_configurations_file: Some(file.path().to_path_buf()),
            ..ServiceConfig::default()
        };

        let configurations = config.load_boot_configurations().unwrap();
        assert_eq!(configurations.len(), 1);
        assert_eq!(configurations[0].name, "compute");
        assert_eq!(configurations[0].priority, 5);

        assert!(ServiceConfig::default().load_boot_configurations().unwrap().is_empty());
    }
}
