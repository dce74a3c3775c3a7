use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, AeadInPlace, KeyInit},
    aes::Aes256,
    AesGcm,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Symmetric key length in bytes (AES-256)
pub const KEY_LEN: usize = 32;
/// Initialization vector length in bytes
pub const IV_LEN: usize = 16;
/// Authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// AES-256-GCM with a 128-bit IV
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// AES-256-GCM encryptor producing `iv_hex:ciphertext_hex:tag_hex`
///
/// Every call draws a fresh random 16-byte IV. The key is zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct Aes256GcmEncryptor {
    #[zeroize(skip)]
    cipher: Aes256Gcm16,
    key: [u8; KEY_LEN],
}

impl Aes256GcmEncryptor {
    pub fn new(key: [u8; KEY_LEN]) -> CryptoResult<Self> {
        let cipher = Aes256Gcm16::new_from_slice(&key)
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                got: key.len(),
            })?;
        Ok(Self { cipher, key })
    }

    /// Generate a new random key (cryptographically secure)
    pub fn generate_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// First 16 hex characters of SHA-256(key); safe to log
    pub fn fingerprint(&self) -> String {
        let mut digest = hex::encode(Sha256::digest(self.key));
        digest.truncate(16);
        digest
    }

    pub(crate) fn key_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn encrypt_string(&self, plaintext: &str) -> CryptoResult<String> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| CryptoError::EncryptionFailed("AES-GCM encryption failed".to_string()))?;

        let encoded = format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(&buffer),
            hex::encode(tag)
        );
        buffer.zeroize();
        Ok(encoded)
    }

    pub fn decrypt_string(&self, encrypted: &str) -> CryptoResult<String> {
        let mut segments = encrypted.split(':');
        let (Some(iv_hex), Some(ct_hex), Some(tag_hex), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(CryptoError::InvalidFormat(
                "expected iv:ciphertext:tag".to_string(),
            ));
        };

        let iv = decode_segment(iv_hex, "iv")?;
        let mut buffer = decode_segment(ct_hex, "ciphertext")?;
        let tag = decode_segment(tag_hex, "tag")?;

        if iv.len() != IV_LEN {
            return Err(CryptoError::InvalidFormat(format!(
                "iv must be {} bytes, got {}",
                IV_LEN,
                iv.len()
            )));
        }
        if tag.len() != TAG_LEN {
            return Err(CryptoError::InvalidFormat(format!(
                "tag must be {} bytes, got {}",
                TAG_LEN,
                tag.len()
            )));
        }

        self.cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(&iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(&tag),
            )
            .map_err(|_| {
                CryptoError::DecryptionFailed("authentication tag mismatch".to_string())
            })?;

        String::from_utf8(buffer).map_err(|e| CryptoError::InvalidUtf8(e.to_string()))
    }
}

fn decode_segment(segment: &str, name: &str) -> CryptoResult<Vec<u8>> {
    hex::decode(segment)
        .map_err(|e| CryptoError::InvalidFormat(format!("{name} segment is not hex: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor() -> Aes256GcmEncryptor {
        Aes256GcmEncryptor::new(Aes256GcmEncryptor::generate_key()).unwrap()
    }

    #[test]
    fn test_encrypt_string() {
        let encryptor = encryptor();

        for plaintext in ["Sensitive PHI data", "", "ünïcødé 🏥", "a:b:c"] {
            let encrypted = encryptor.encrypt_string(plaintext).unwrap();
            assert_eq!(encryptor.decrypt_string(&encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_output_format() {
        let encrypted = encryptor().encrypt_string("test data").unwrap();

        let parts: Vec<&str> = encrypted.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), IV_LEN * 2);
        assert_eq!(parts[1].len(), "test data".len() * 2);
        assert_eq!(parts[2].len(), TAG_LEN * 2);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let encryptor = encryptor();
        let first = encryptor.encrypt_string("same").unwrap();
        let second = encryptor.encrypt_string("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_tampered_tag_fails() {
        let encryptor = encryptor();
        let encrypted = encryptor.encrypt_string("allergy: penicillin").unwrap();
        let parts: Vec<&str> = encrypted.split(':').collect();
        let mut tag = hex::decode(parts[2]).unwrap();

        for i in 0..tag.len() {
            tag[i] ^= 0x01;
            let tampered = format!("{}:{}:{}", parts[0], parts[1], hex::encode(&tag));
            assert!(matches!(
                encryptor.decrypt_string(&tampered),
                Err(CryptoError::DecryptionFailed(_))
            ));
            tag[i] ^= 0x01;
        }
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let encryptor = encryptor();
        let encrypted = encryptor.encrypt_string("blood type O+").unwrap();
        let parts: Vec<&str> = encrypted.split(':').collect();
        let mut ct = hex::decode(parts[1]).unwrap();
        ct[0] ^= 0x80;
        let tampered = format!("{}:{}:{}", parts[0], hex::encode(ct), parts[2]);
        assert!(encryptor.decrypt_string(&tampered).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = encryptor().encrypt_string("secret").unwrap();
        assert!(encryptor().decrypt_string(&encrypted).is_err());
    }

    #[test]
    fn test_malformed_input() {
        let encryptor = encryptor();
        for bad in ["", "abcd", "aa:bb", "aa:bb:cc:dd", "zz:00:00"] {
            assert!(
                matches!(encryptor.decrypt_string(bad), Err(CryptoError::InvalidFormat(_))),
                "{bad:?} should be rejected as malformed"
            );
        }

        let short_tag = format!("{}:{}:{}", "00".repeat(IV_LEN), "00", "00".repeat(8));
        assert!(matches!(
            encryptor.decrypt_string(&short_tag),
            Err(CryptoError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let key = [7u8; KEY_LEN];
        let a = Aes256GcmEncryptor::new(key).unwrap();
        let b = Aes256GcmEncryptor::new(key).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
        assert!(!a.fingerprint().contains(&hex::encode(key)));
    }
}
