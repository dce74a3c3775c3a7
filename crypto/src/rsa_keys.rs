use std::fs;
use std::io::Write;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;
use tracing::info;

use crate::error::{CryptoError, CryptoResult};

pub const PRIVATE_KEY_FILE: &str = "private.pem";
pub const PUBLIC_KEY_FILE: &str = "public.pem";

/// RSA key pair used for OAEP-SHA256 encryption
pub struct RsaKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl RsaKeyPair {
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Load `private.pem` and `public.pem` from `dir`, or generate and persist a new pair
    ///
    /// The private key file is created with mode `0600` on Unix.
    pub fn load_or_generate(dir: &Path, bits: usize) -> CryptoResult<Self> {
        let private_path = dir.join(PRIVATE_KEY_FILE);
        let public_path = dir.join(PUBLIC_KEY_FILE);

        if private_path.exists() && public_path.exists() {
            let pair = Self::load(&private_path, &public_path)?;
            info!(dir = %dir.display(), "Loaded RSA key pair");
            return Ok(pair);
        }

        info!(dir = %dir.display(), bits, "Generating RSA key pair");
        let pair = Self::generate(bits)?;
        pair.save(dir)?;
        Ok(pair)
    }

    fn load(private_path: &Path, public_path: &Path) -> CryptoResult<Self> {
        let private_pem = zeroize::Zeroizing::new(fs::read_to_string(private_path)?);
        let public_pem = fs::read_to_string(public_path)?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(&private_pem)
            .map_err(|e| CryptoError::InvalidKey(format!("{}: {e}", private_path.display())))?;
        let public_key = RsaPublicKey::from_public_key_pem(&public_pem)
            .map_err(|e| CryptoError::InvalidKey(format!("{}: {e}", public_path.display())))?;

        if RsaPublicKey::from(&private_key) != public_key {
            return Err(CryptoError::InvalidKey(
                "public.pem does not match private.pem".to_string(),
            ));
        }

        Ok(Self {
            private_key,
            public_key,
        })
    }

    fn save(&self, dir: &Path) -> CryptoResult<()> {
        fs::create_dir_all(dir)?;

        let private_pem = self
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
        let public_pem = self
            .public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;

        write_private(&dir.join(PRIVATE_KEY_FILE), private_pem.as_bytes())?;
        fs::write(dir.join(PUBLIC_KEY_FILE), public_pem.as_bytes())?;
        Ok(())
    }

    /// OAEP-SHA256 encrypt, returning base64
    pub fn encrypt_base64(&self, plaintext: &[u8]) -> CryptoResult<String> {
        let ciphertext = self
            .public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok(BASE64.encode(ciphertext))
    }

    pub fn decrypt_base64(&self, encoded: &str) -> CryptoResult<Vec<u8>> {
        let ciphertext = BASE64
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidFormat(format!("ciphertext is not base64: {e}")))?;
        self.private_key
            .decrypt(Oaep::new::<Sha256>(), &ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> CryptoResult<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> CryptoResult<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BITS: usize = 1024;

    #[test]
    fn test_generate_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let keys_dir = dir.path().join("keys");

        let generated = RsaKeyPair::load_or_generate(&keys_dir, TEST_BITS).unwrap();
        assert!(keys_dir.join(PRIVATE_KEY_FILE).exists());
        assert!(keys_dir.join(PUBLIC_KEY_FILE).exists());

        let reloaded = RsaKeyPair::load_or_generate(&keys_dir, TEST_BITS).unwrap();
        assert_eq!(generated.public_key(), reloaded.public_key());

        let ciphertext = generated.encrypt_base64(b"MRN-00417").unwrap();
        assert_eq!(reloaded.decrypt_base64(&ciphertext).unwrap(), b"MRN-00417");
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        RsaKeyPair::load_or_generate(dir.path(), TEST_BITS).unwrap();

        let mode = fs::metadata(dir.path().join(PRIVATE_KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_key_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PRIVATE_KEY_FILE), "not a key").unwrap();
        fs::write(dir.path().join(PUBLIC_KEY_FILE), "not a key").unwrap();

        assert!(matches!(
            RsaKeyPair::load_or_generate(dir.path(), TEST_BITS),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let pair = RsaKeyPair::generate(TEST_BITS).unwrap();
        assert!(matches!(
            pair.decrypt_base64("%%%"),
            Err(CryptoError::InvalidFormat(_))
        ));
        assert!(matches!(
            pair.decrypt_base64(&BASE64.encode([0u8; 128])),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }
}
