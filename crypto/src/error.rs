use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Invalid encrypted data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid UTF-8 in decrypted data: {0}")]
    InvalidUtf8(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Key storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for error_common::CareHubError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed(_)
            | CryptoError::InvalidFormat(_)
            | CryptoError::InvalidUtf8(_) => Self::Integrity(err.to_string()),
            CryptoError::InvalidKey(_)
            | CryptoError::InvalidKeyLength { .. }
            | CryptoError::KeyUnavailable(_)
            | CryptoError::Configuration(_) => Self::Configuration(err.to_string()),
            CryptoError::InternalError(inner) => Self::Other(inner),
            other => Self::Crypto(other.to_string()),
        }
    }
}
