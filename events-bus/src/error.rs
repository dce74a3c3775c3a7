use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Event serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Event listener failed: {0}")]
    ListenerFailed(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl EventBusError {
    pub fn listener(message: impl Into<String>) -> Self {
        Self::ListenerFailed(message.into())
    }
}

pub type Result<T> = std::result::Result<T, EventBusError>;

impl From<EventBusError> for error_common::CareHubError {
    fn from(err: EventBusError) -> Self {
        match err {
            EventBusError::InternalError(inner) => Self::Other(inner),
            other => Self::Event(other.to_string()),
        }
    }
}
