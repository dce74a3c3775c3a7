//! Plugin runtime error types

use thiserror::Error;

/// Main plugin runtime error type
#[derive(Error, Debug)]
pub enum PluginRuntimeError {
    /// No module registered under this name
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// Name already taken and the registry rejects duplicates
    #[error("Module already registered: {0}")]
    ModuleAlreadyRegistered(String),

    /// Name cannot be used as a route segment
    #[error("Invalid module name {name:?}: {reason}")]
    InvalidModuleName { name: String, reason: String },

    /// Declared dependency is not registered
    #[error("Module '{module}' depends on unregistered module '{dependency}'")]
    MissingDependency { module: String, dependency: String },

    /// Dependency graph contains a cycle among these modules
    #[error("Dependency cycle among modules: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// Invalid state for the requested operation
    #[error("Invalid plugin state: {0}")]
    InvalidState(String),

    /// Module lifecycle hook or route configuration failed
    #[error("Module '{module}' failed: {message}")]
    LifecycleFailed { module: String, message: String },

    /// Plugin loading failed
    #[error("Plugin loading failed: {0}")]
    LoadingFailed(String),

    /// Loaded library does not expose a conforming module
    #[error("Invalid plugin module: {0}")]
    InvalidModule(String),

    /// Invalid plugin manifest
    #[error("Invalid plugin manifest: {0}")]
    InvalidManifest(String),

    /// Path escapes the plugin directory
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Plugin runtime result type
pub type PluginResult<T> = Result<T, PluginRuntimeError>;

impl PluginRuntimeError {
    /// Lifecycle failure attributed to `module`
    pub fn lifecycle(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LifecycleFailed {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from discovering or loading a plugin
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::LoadingFailed(_)
                | Self::InvalidModule(_)
                | Self::InvalidManifest(_)
                | Self::SecurityViolation(_)
                | Self::IoError(_)
                | Self::JsonError(_)
        )
    }
}

impl From<PluginRuntimeError> for error_common::CareHubError {
    fn from(err: PluginRuntimeError) -> Self {
        match err {
            PluginRuntimeError::ModuleNotFound(_) => Self::NotFound(err.to_string()),
            PluginRuntimeError::ModuleAlreadyRegistered(_) => Self::Conflict(err.to_string()),
            PluginRuntimeError::InvalidModuleName { .. }
            | PluginRuntimeError::MissingDependency { .. }
            | PluginRuntimeError::DependencyCycle(_) => Self::Configuration(err.to_string()),
            ref e if e.is_load_error() => Self::Plugin(err.to_string()),
            _ => Self::Module(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_common::CareHubError;

    #[test]
    fn test_cycle_message_lists_modules() {
        let err = PluginRuntimeError::DependencyCycle(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Dependency cycle among modules: a, b");
    }

    #[test]
    fn test_host_error_mapping() {
        assert!(matches!(
            CareHubError::from(PluginRuntimeError::ModuleNotFound("x".into())),
            CareHubError::NotFound(_)
        ));
        assert!(matches!(
            CareHubError::from(PluginRuntimeError::InvalidManifest("x".into())),
            CareHubError::Plugin(_)
        ));
        assert!(matches!(
            CareHubError::from(PluginRuntimeError::lifecycle("auth", "db down")),
            CareHubError::Module(_)
        ));
        assert!(matches!(
            CareHubError::from(PluginRuntimeError::DependencyCycle(vec![])),
            CareHubError::Configuration(_)
        ));
    }
}
