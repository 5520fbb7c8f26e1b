//! Service-specific error types.
//!
//! Errors raised while configuring and starting the Boot Script Service that
//! are not covered by the engine's own errors.

use boot_script::ProviderError;
use thiserror::Error;

/// Errors that can occur in the Boot Script Service binary.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration or boot configurations file could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Listener or file I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Node provider could not be built
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}
