//! Boot engine errors

use thiserror::Error;

/// Errors returned to callers of the boot script service
///
/// Only `Invalid` is surfaced by `generate_boot_script`; the other variants
/// are degraded into minimal or error scripts before reaching firmware.
#[derive(Debug, Error)]
pub enum BootError {
    /// Malformed or empty identifier
    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Backing provider or store unreachable
    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Node provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Identifier unknown to the provider
    #[error("Node not found: {0}")]
    NotFound(String),

    /// Source cannot be reached or read
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Source returned data that cannot be used
    #[error("Invalid provider data: {0}")]
    Invalid(String),
}

impl From<hsm_client::HsmError> for ProviderError {
    fn from(e: hsm_client::HsmError) -> Self {
        use hsm_client::HsmError;
        match e {
            HsmError::NotFound(what) => ProviderError::NotFound(what),
            HsmError::InvalidRequest(msg) => ProviderError::Invalid(msg),
            HsmError::Serialization(err) => ProviderError::Invalid(err.to_string()),
            other => ProviderError::Unavailable(other.to_string()),
        }
    }
}

/// Node store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique field (xname, NID or MAC) already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid resource: {0}")]
    Invalid(String),
}

/// Template binding errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// Kernel URL yields no filename
    #[error("kernel filename is empty for '{0}'")]
    EmptyKernelFilename(String),

    /// Non-empty initrd URL yields no filename
    #[error("initrd filename is empty for '{0}'")]
    EmptyInitrdFilename(String),

    /// A `{{name}}` placeholder with no binding
    #[error("unresolved template placeholder: {0}")]
    UnresolvedPlaceholder(String),

    #[error("malformed template: {0}")]
    MalformedTemplate(String),
}

/// Synchronization cycle errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing provider components failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Listing stored nodes failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
