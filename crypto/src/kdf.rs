use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::constant_time::ct_eq;
use crate::error::{CryptoError, CryptoResult};

/// Format tag of password hashes produced before the move to Argon2id
pub const LEGACY_PBKDF2_TAG: &str = "pbkdf2-sha512";
/// Output length of the legacy PBKDF2 hashes
pub const LEGACY_PBKDF2_KEY_LEN: usize = 64;

/// Argon2 parameters for password hashing
#[derive(Debug, Clone)]
pub struct Argon2Params {
    /// Memory cost in KiB (minimum 19456 for Argon2id)
    pub memory_cost: u32,
    /// Time cost (iterations)
    pub time_cost: u32,
    /// Parallelism factor
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_cost: 19456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// Key Derivation Function utilities
pub struct Kdf;

impl Kdf {
    /// Hash a password with Argon2id, returning a PHC string
    pub fn argon2_hash(password: &[u8], params: &Argon2Params) -> CryptoResult<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());

        let argon2 = Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            argon2::Params::new(params.memory_cost, params.time_cost, params.parallelism, None)
                .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?,
        );

        let password_hash = argon2
            .hash_password(password, &salt)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against an Argon2 PHC string
    ///
    /// Parameters are read from the hash itself.
    pub fn argon2_verify(password: &[u8], password_hash: &str) -> CryptoResult<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| CryptoError::InvalidFormat(format!("password hash: {e}")))?;

        Ok(Argon2::default()
            .verify_password(password, &parsed_hash)
            .is_ok())
    }

    /// Legacy hash: `$pbkdf2-sha512$i=<iterations>$<salt>$<hash-hex>`
    ///
    /// The salt string's bytes are the PBKDF2 salt, as they were when these
    /// hashes were first written.
    pub fn pbkdf2_legacy_hash(password: &[u8], salt: &str, iterations: u32) -> String {
        let derived = Self::pbkdf2_sha512(password, salt.as_bytes(), iterations);
        format!(
            "${}$i={}${}${}",
            LEGACY_PBKDF2_TAG,
            iterations,
            salt,
            hex::encode(derived.as_slice())
        )
    }

    pub fn pbkdf2_legacy_verify(password: &[u8], password_hash: &str) -> CryptoResult<bool> {
        let malformed = || CryptoError::InvalidFormat("legacy PBKDF2 hash".to_string());

        let mut fields = password_hash.split('$');
        let (Some(""), Some(LEGACY_PBKDF2_TAG), Some(iterations), Some(salt), Some(hash), None) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return Err(malformed());
        };

        let iterations: u32 = iterations
            .strip_prefix("i=")
            .and_then(|i| i.parse().ok())
            .filter(|i| *i > 0)
            .ok_or_else(malformed)?;
        let expected = hex::decode(hash).map_err(|_| malformed())?;

        let derived = Self::pbkdf2_sha512(password, salt.as_bytes(), iterations);
        Ok(ct_eq(derived.as_slice(), &expected))
    }

    fn pbkdf2_sha512(password: &[u8], salt: &[u8], iterations: u32) -> Zeroizing<Vec<u8>> {
        let mut derived = Zeroizing::new(vec![0u8; LEGACY_PBKDF2_KEY_LEN]);
        pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut derived);
        derived
    }

    /// Verify against either an Argon2 PHC string or a legacy PBKDF2 hash
    pub fn verify_password(password: &[u8], password_hash: &str) -> CryptoResult<bool> {
        if password_hash.starts_with(&format!("${LEGACY_PBKDF2_TAG}$")) {
            Self::pbkdf2_legacy_verify(password, password_hash)
        } else {
            Self::argon2_verify(password, password_hash)
        }
    }
}
