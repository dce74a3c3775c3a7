use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache value serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache provider error: {0}")]
    Provider(String),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type CacheResult<T> = Result<T, CacheError>;

impl From<CacheError> for error_common::CareHubError {
    fn from(err: CacheError) -> Self {
        Self::Cache(err.to_string())
    }
}
