use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Prefix for layered environment variables
pub const ENV_PREFIX: &str = "CAREHUB";
/// Separator between prefix and nested keys
pub const ENV_SEPARATOR: &str = "__";
/// Legacy variable holding the hex symmetric key
pub const ENCRYPTION_KEY_VAR: &str = "ENCRYPTION_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    #[default]
    Development,
    Production,
}

impl DeploymentEnvironment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where module routers are mounted: `{base_path}/{version}/{module}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_path: String,
    pub version: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_path: "/api".to_string(),
            version: "v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Replace an already registered module instead of rejecting the duplicate
    pub allow_overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    pub enabled: bool,
    pub directory: PathBuf,
    pub manifest_file: String,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("./plugins"),
            manifest_file: "manifest.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub default_ttl_seconds: u64,
    /// Redis connection URL; the in-memory provider is used when unset
    pub redis_url: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_seconds: 300,
            redis_url: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoSettings {
    /// 64 hex characters (256 bits)
    pub encryption_key: Option<String>,
    pub keys_dir: PathBuf,
    pub rsa_key_bits: usize,
    pub rsa_enabled: bool,
}

impl Default for CryptoSettings {
    fn default() -> Self {
        Self {
            encryption_key: None,
            keys_dir: PathBuf::from("./keys"),
            rsa_key_bits: 4096,
            rsa_enabled: true,
        }
    }
}

// Keeps the key out of `{:?}` output
impl std::fmt::Debug for CryptoSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoSettings")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .field("keys_dir", &self.keys_dir)
            .field("rsa_key_bits", &self.rsa_key_bits)
            .field("rsa_enabled", &self.rsa_enabled)
            .finish()
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub environment: DeploymentEnvironment,
    pub server: ServerSettings,
    pub api: ApiSettings,
    pub modules: ModuleSettings,
    pub plugins: PluginSettings,
    pub cache: CacheSettings,
    pub crypto: CryptoSettings,
}

impl RuntimeSettings {
    /// Load settings from defaults, an optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    /// Same as [`RuntimeSettings::load`] but reads variables from `vars`
    pub fn load_with_env(path: Option<&Path>, vars: HashMap<String, String>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::SourceNotFound(path.display().to_string()));
            }
            debug!(path = %path.display(), "Adding configuration file source");
            builder = builder.add_source(File::from(path).required(true));
        }

        let legacy_key = vars
            .get(ENCRYPTION_KEY_VAR)
            .filter(|key| !key.trim().is_empty())
            .cloned();

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .source(Some(vars)),
        );

        let mut settings: RuntimeSettings = builder.build()?.try_deserialize()?;

        if settings.crypto.encryption_key.is_none() {
            settings.crypto.encryption_key = legacy_key;
        }

        Ok(settings)
    }
}
