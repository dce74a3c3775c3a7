use thiserror::Error;

use crate::codes;

/// Host-level error shared by the runtime crates
#[derive(Error, Debug)]
pub enum CareHubError {
    /// Invalid or missing configuration (settings, manifests, keys)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Module lifecycle failure
    #[error("Module error: {0}")]
    Module(String),

    /// Plugin discovery or loading failure
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Data failed an integrity check (ciphertext, tag, MAC)
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Cryptographic operation failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Cache provider failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Event dispatch failure
    #[error("Event bus error: {0}")]
    Event(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Wrapped external errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, CareHubError>;

impl CareHubError {
    /// Stable error code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => codes::configuration::INVALID_SETTING,
            Self::Module(_) => codes::module::LIFECYCLE_FAILED,
            Self::Plugin(_) => codes::plugin::LOAD_FAILED,
            Self::NotFound(_) => codes::module::NOT_FOUND,
            Self::Conflict(_) => codes::module::CONFLICT,
            Self::Integrity(_) => codes::integrity::TAG_MISMATCH,
            Self::Crypto(_) => codes::crypto::OPERATION_FAILED,
            Self::Cache(_) => codes::cache::PROVIDER_FAILED,
            Self::Event(_) => codes::event::DISPATCH_FAILED,
            Self::Internal(_) | Self::Other(_) => codes::internal::UNEXPECTED,
        }
    }

    /// Short category name used in logs and response bodies
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Module(_) => "module",
            Self::Plugin(_) => "plugin",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Integrity(_) => "integrity",
            Self::Crypto(_) => "crypto",
            Self::Cache(_) => "cache",
            Self::Event(_) => "event",
            Self::Internal(_) | Self::Other(_) => "internal",
        }
    }

    /// Whether the caller caused the failure (4xx) rather than the host (5xx)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Conflict(_) | Self::Integrity(_))
    }
}
