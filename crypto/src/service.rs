use std::fmt;

use rand::{rngs::OsRng, RngCore};
use ring::hmac;
use tracing::{error, info, warn};

use crate::config::{decode_key, CryptoConfig};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{Argon2Params, Kdf};
use crate::rsa_keys::RsaKeyPair;
use crate::symmetric::{Aes256GcmEncryptor, KEY_LEN};

/// Token length used by [`CryptoService::generate_default_token`]
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Process-wide key material and the operations built on it
///
/// Constructed once by the host and shared behind an `Arc`. RSA key
/// generation is slow at 4096 bits; construct on a blocking thread.
pub struct CryptoService {
    encryptor: Aes256GcmEncryptor,
    hmac_key: hmac::Key,
    ephemeral: bool,
    rsa: Option<RsaKeyPair>,
    argon2: Argon2Params,
}

impl CryptoService {
    /// Build the service from configuration
    ///
    /// A missing symmetric key is replaced by a random one that only lives as
    /// long as the process; this is refused in production. RSA material that
    /// cannot be loaded or generated is logged and left unavailable, so the
    /// RSA operations fail with [`CryptoError::KeyUnavailable`].
    pub fn new(config: &CryptoConfig) -> CryptoResult<Self> {
        config.validate()?;

        let (key, ephemeral) = match &config.encryption_key {
            Some(hex_key) => (decode_key(hex_key)?, false),
            None => (Aes256GcmEncryptor::generate_key(), true),
        };
        let mut service = Self::from_key(key, ephemeral)?;

        if ephemeral {
            warn!(
                key_fingerprint = %service.key_fingerprint(),
                "ENCRYPTION_KEY not set; generated an ephemeral key. \
                 Data encrypted with it cannot be decrypted after a restart"
            );
        }

        if config.rsa_enabled {
            match RsaKeyPair::load_or_generate(&config.keys_dir, config.rsa_key_bits) {
                Ok(pair) => service.rsa = Some(pair),
                Err(e) => error!(
                    keys_dir = %config.keys_dir.display(),
                    error = %e,
                    "RSA key pair unavailable; asymmetric operations are disabled"
                ),
            }
        }

        info!(
            key_fingerprint = %service.key_fingerprint(),
            rsa = service.has_rsa_keys(),
            "Crypto service initialized"
        );
        Ok(service)
    }

    /// Service with a fixed symmetric key and no RSA material
    pub fn symmetric_only(key: [u8; KEY_LEN]) -> CryptoResult<Self> {
        Self::from_key(key, false)
    }

    fn from_key(key: [u8; KEY_LEN], ephemeral: bool) -> CryptoResult<Self> {
        let encryptor = Aes256GcmEncryptor::new(key)?;
        let hmac_key = hmac::Key::new(hmac::HMAC_SHA256, encryptor.key_bytes());
        Ok(Self {
            encryptor,
            hmac_key,
            ephemeral,
            rsa: None,
            argon2: Argon2Params::default(),
        })
    }

    /// Override the Argon2id cost parameters used by [`hash_password`](Self::hash_password)
    pub fn with_argon2_params(mut self, params: Argon2Params) -> Self {
        self.argon2 = params;
        self
    }

    pub fn with_rsa_keys(mut self, pair: RsaKeyPair) -> Self {
        self.rsa = Some(pair);
        self
    }

    pub fn key_fingerprint(&self) -> String {
        self.encryptor.fingerprint()
    }

    pub fn is_key_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn has_rsa_keys(&self) -> bool {
        self.rsa.is_some()
    }

    /// AES-256-GCM, output `iv_hex:ciphertext_hex:tag_hex`
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        self.encryptor.encrypt_string(plaintext)
    }

    pub fn decrypt(&self, encrypted: &str) -> CryptoResult<String> {
        self.encryptor.decrypt_string(encrypted)
    }

    fn rsa(&self) -> CryptoResult<&RsaKeyPair> {
        self.rsa
            .as_ref()
            .ok_or_else(|| CryptoError::KeyUnavailable("no RSA key pair loaded".to_string()))
    }

    /// RSA-OAEP-SHA256, output base64
    pub fn encrypt_rsa(&self, plaintext: &str) -> CryptoResult<String> {
        self.rsa()?.encrypt_base64(plaintext.as_bytes())
    }

    pub fn decrypt_rsa(&self, encrypted: &str) -> CryptoResult<String> {
        let plaintext = self.rsa()?.decrypt_base64(encrypted)?;
        String::from_utf8(plaintext).map_err(|e| CryptoError::InvalidUtf8(e.to_string()))
    }

    /// Argon2id PHC string
    pub fn hash_password(&self, password: &str) -> CryptoResult<String> {
        Kdf::argon2_hash(password.as_bytes(), &self.argon2)
    }

    /// Accepts Argon2 PHC strings and legacy `$pbkdf2-sha512$` hashes
    pub fn verify_password(&self, password: &str, password_hash: &str) -> CryptoResult<bool> {
        Kdf::verify_password(password.as_bytes(), password_hash)
    }

    /// `bytes` of OS randomness, hex-encoded
    pub fn generate_token(&self, bytes: usize) -> String {
        let mut buf = zeroize::Zeroizing::new(vec![0u8; bytes]);
        OsRng.fill_bytes(&mut buf);
        hex::encode(buf.as_slice())
    }

    pub fn generate_default_token(&self) -> String {
        self.generate_token(DEFAULT_TOKEN_BYTES)
    }

    /// HMAC-SHA256 keyed by the symmetric key, hex-encoded
    pub fn generate_hmac(&self, data: &str) -> String {
        hex::encode(hmac::sign(&self.hmac_key, data.as_bytes()).as_ref())
    }

    /// Constant-time check of a hex MAC; malformed hex is a mismatch
    pub fn verify_hmac(&self, data: &str, mac: &str) -> bool {
        let Ok(mac) = hex::decode(mac) else {
            return false;
        };
        hmac::verify(&self.hmac_key, data.as_bytes(), &mac).is_ok()
    }
}

impl fmt::Debug for CryptoService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoService")
            .field("key_fingerprint", &self.key_fingerprint())
            .field("ephemeral", &self.ephemeral)
            .field("rsa", &self.has_rsa_keys())
            .finish_non_exhaustive()
    }
}
