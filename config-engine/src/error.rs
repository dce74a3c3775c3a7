use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration source not found: {0}")]
    SourceNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    ParseError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for error_common::CareHubError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InternalError(inner) => Self::Other(inner),
            other => Self::Configuration(other.to_string()),
        }
    }
}
