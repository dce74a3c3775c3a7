use tracing::warn;

use crate::error::{ConfigError, Result};
use crate::settings::{
    ApiSettings, CryptoSettings, DeploymentEnvironment, PluginSettings, RuntimeSettings,
};

/// Smallest RSA modulus accepted for key generation
pub const MIN_RSA_KEY_BITS: usize = 1024;

/// Validation hook implemented by each settings section
pub trait ConfigValidator {
    fn validate(&self) -> Result<()>;
}

impl ConfigValidator for ApiSettings {
    fn validate(&self) -> Result<()> {
        let segments = self.base_path.strip_prefix('/').map(|rest| rest.split('/'));
        if !segments.is_some_and(|mut s| s.all(is_path_segment)) {
            return Err(ConfigError::ValidationError(format!(
                "api.base_path must be '/'-separated literal path segments: {:?}",
                self.base_path
            )));
        }
        if !is_path_segment(&self.version) {
            return Err(ConfigError::ValidationError(format!(
                "api.version must be a single path segment: {:?}",
                self.version
            )));
        }
        Ok(())
    }
}

/// Non-empty literal route segment: no separators, wildcards or captures
fn is_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '*' | ':' | '{' | '}'))
}

impl ConfigValidator for PluginSettings {
    fn validate(&self) -> Result<()> {
        if self.manifest_file.is_empty()
            || self.manifest_file.contains('/')
            || self.manifest_file.contains('\\')
        {
            return Err(ConfigError::ValidationError(format!(
                "plugins.manifest_file must be a bare file name: {:?}",
                self.manifest_file
            )));
        }
        Ok(())
    }
}

impl ConfigValidator for CryptoSettings {
    fn validate(&self) -> Result<()> {
        if let Some(key) = &self.encryption_key {
            if key.len() != 64 || hex::decode(key).is_err() {
                return Err(ConfigError::ValidationError(
                    "crypto.encryption_key must be 64 hex characters (256 bits)".to_string(),
                ));
            }
        }
        if self.rsa_enabled && self.rsa_key_bits < MIN_RSA_KEY_BITS {
            return Err(ConfigError::ValidationError(format!(
                "crypto.rsa_key_bits must be at least {}, got {}",
                MIN_RSA_KEY_BITS, self.rsa_key_bits
            )));
        }
        Ok(())
    }
}

impl ConfigValidator for RuntimeSettings {
    fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.plugins.validate()?;
        self.crypto.validate()?;

        if self.crypto.encryption_key.is_none() {
            match self.environment {
                DeploymentEnvironment::Production => {
                    return Err(ConfigError::ValidationError(
                        "crypto.encryption_key (or ENCRYPTION_KEY) is required in production; \
                         a generated key would not survive a restart"
                            .to_string(),
                    ));
                }
                DeploymentEnvironment::Development => {
                    warn!("No encryption key configured; an ephemeral key will be generated");
                }
            }
        }

        Ok(())
    }
}

impl RuntimeSettings {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        ConfigValidator::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(RuntimeSettings::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_base_path() {
        for bad in ["api", "/api/", "/", "/api//v", "/:tenant", "/api/*rest"] {
            let mut settings = RuntimeSettings::default();
            settings.api.base_path = bad.to_string();
            assert!(settings.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rejects_bad_version() {
        let mut settings = RuntimeSettings::default();
        settings.api.version = "v1/beta".to_string();
        assert!(settings.validate().is_err());

        settings.api.version = String::new();
        assert!(settings.validate().is_err());

        for bad in [":v", "*v", "{v}", "v 1"] {
            settings.api.version = bad.to_string();
            assert!(settings.validate().is_err(), "{bad} should be rejected");
        }

        settings.api.version = "v2".to_string();
        settings.api.base_path = "/internal/api".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_rejects_malformed_key() {
        let mut settings = RuntimeSettings::default();
        settings.crypto.encryption_key = Some("not-hex".to_string());
        assert!(settings.validate().is_err());

        settings.crypto.encryption_key = Some("zz".repeat(32));
        assert!(settings.validate().is_err());

        settings.crypto.encryption_key = Some("0f".repeat(32));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_rejects_small_rsa_keys() {
        let mut settings = RuntimeSettings::default();
        settings.crypto.rsa_key_bits = 512;
        assert!(settings.validate().is_err());

        settings.crypto.rsa_enabled = false;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_production_requires_key() {
        let mut settings = RuntimeSettings::default();
        settings.environment = DeploymentEnvironment::Production;

        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("required in production"));

        settings.crypto.encryption_key = Some("11".repeat(32));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_rejects_manifest_path() {
        let mut settings = RuntimeSettings::default();
        settings.plugins.manifest_file = "../manifest.json".to_string();
        assert!(settings.validate().is_err());
    }
}
