//! Crypto service configuration

use std::fmt;
use std::path::PathBuf;

use crate::symmetric::KEY_LEN;
use crate::error::{CryptoError, CryptoResult};

/// Smallest RSA modulus the service will generate or accept
pub const MIN_RSA_KEY_BITS: usize = 1024;

#[derive(Clone)]
pub struct CryptoConfig {
    /// Hex-encoded 256-bit symmetric key; generated per process when absent
    pub encryption_key: Option<String>,
    /// Directory holding `private.pem` and `public.pem`
    pub keys_dir: PathBuf,
    pub rsa_key_bits: usize,
    pub rsa_enabled: bool,
    /// A missing symmetric key is fatal in production
    pub environment_is_production: bool,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            encryption_key: None,
            keys_dir: PathBuf::from("./keys"),
            rsa_key_bits: 4096,
            rsa_enabled: true,
            environment_is_production: false,
        }
    }
}

impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .field("keys_dir", &self.keys_dir)
            .field("rsa_key_bits", &self.rsa_key_bits)
            .field("rsa_enabled", &self.rsa_enabled)
            .field("environment_is_production", &self.environment_is_production)
            .finish()
    }
}

impl CryptoConfig {
    pub fn validate(&self) -> CryptoResult<()> {
        match &self.encryption_key {
            Some(key) => {
                decode_key(key)?;
            }
            None if self.environment_is_production => {
                return Err(CryptoError::Configuration(
                    "ENCRYPTION_KEY must be set in production".to_string(),
                ));
            }
            None => {}
        }

        if self.rsa_enabled && self.rsa_key_bits < MIN_RSA_KEY_BITS {
            return Err(CryptoError::Configuration(format!(
                "RSA key size must be at least {} bits, got {}",
                MIN_RSA_KEY_BITS, self.rsa_key_bits
            )));
        }

        Ok(())
    }
}

/// Decode a 64-character hex key
pub fn decode_key(hex_key: &str) -> CryptoResult<[u8; KEY_LEN]> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| CryptoError::InvalidKey(format!("encryption key is not hex: {e}")))?;
    <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_LEN,
        got: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_key() {
        let key = decode_key(&"0a".repeat(32)).unwrap();
        assert_eq!(key, [0x0a; 32]);

        assert!(matches!(
            decode_key(&"0a".repeat(16)),
            Err(CryptoError::InvalidKeyLength { expected: 32, got: 16 })
        ));
        assert!(matches!(decode_key("xyz"), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_production_requires_key() {
        let config = CryptoConfig {
            environment_is_production: true,
            ..CryptoConfig::default()
        };
        assert!(matches!(config.validate(), Err(CryptoError::Configuration(_))));

        let config = CryptoConfig {
            encryption_key: Some("ff".repeat(32)),
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_small_rsa() {
        let config = CryptoConfig {
            rsa_key_bits: 512,
            ..CryptoConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = CryptoConfig {
            encryption_key: Some("ab".repeat(32)),
            ..CryptoConfig::default()
        };
        assert!(!format!("{config:?}").contains("abab"));
    }
}
