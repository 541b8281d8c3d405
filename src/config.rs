//! Configuration types for zenodo-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Production API base URL
pub const ZENODO_API: &str = "https://zenodo.org/api";

/// Sandbox API base URL
pub const ZENODO_SANDBOX_API: &str = "https://sandbox.zenodo.org/api";

/// Remote service settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base URL without trailing slash (default: "https://zenodo.org/api")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout (None = transport default, no explicit timeout)
    #[serde(default, with = "optional_duration_serde")]
    pub timeout: Option<Duration>,

    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: None,
            user_agent: default_user_agent(),
        }
    }
}

/// Credential sources and storage
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Environment variable checked first (default: "ZENODO_TOKEN")
    #[serde(default = "default_env_var")]
    pub env_var: String,

    /// Encrypted token store (default: "~/.zenodo_token.enc")
    #[serde(default = "default_encrypted_path")]
    pub encrypted_path: PathBuf,

    /// Plaintext token store (default: "~/.zenodo_token")
    #[serde(default = "default_plaintext_path")]
    pub plaintext_path: PathBuf,

    /// PBKDF2 iterations for new encrypted stores (default: 10000, the `openssl enc -pbkdf2` default)
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            env_var: default_env_var(),
            encrypted_path: default_encrypted_path(),
            plaintext_path: default_plaintext_path(),
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

/// Download behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Output directory (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File collision handling for individual downloads
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Compare listing size with free space before downloading (default: true)
    #[serde(default = "default_true")]
    pub check_disk_space: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_collision: FileCollisionAction::default(),
            check_disk_space: true,
        }
    }
}

/// Post-download extraction
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Extract archives after download (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Delete the archive after a successful extraction (default: false)
    #[serde(default)]
    pub delete_after: bool,

    /// Path to the tar executable (auto-detected if None)
    #[serde(default)]
    pub tar_path: Option<PathBuf>,
}

/// Main configuration
///
/// Sections map onto TOML tables of the same name; every field has a default
/// so an empty file (or no file) is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote service settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Credential sources and storage
    #[serde(default)]
    pub credentials: CredentialConfig,

    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Post-download extraction
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Load configuration from an explicit file, or from the default location
    /// if it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.is_file()),
        };

        let config = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                let text = std::fs::read_to_string(&path).map_err(|e| Error::Config {
                    message: format!("failed to read {}: {}", path.display(), e),
                    key: None,
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reject settings that would make every operation fail
    pub fn validate(&self) -> Result<()> {
        let base = self.api.base_url.trim();
        if base.is_empty() {
            return Err(Error::Config {
                message: "base URL must not be empty".to_string(),
                key: Some("api.base_url".to_string()),
            });
        }
        url::Url::parse(base).map_err(|e| Error::Config {
            message: format!("invalid base URL {base:?}: {e}"),
            key: Some("api.base_url".to_string()),
        })?;

        if self.credentials.kdf_iterations == 0 {
            return Err(Error::Config {
                message: "KDF iterations must be at least 1".to_string(),
                key: Some("credentials.kdf_iterations".to_string()),
            });
        }

        if self.credentials.env_var.is_empty() {
            return Err(Error::Config {
                message: "environment variable name must not be empty".to_string(),
                key: Some("credentials.env_var".to_string()),
            });
        }

        Ok(())
    }

    /// Base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        self.api.base_url.trim().trim_end_matches('/')
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename
    Rename,
    /// Overwrite existing file (default)
    #[default]
    Overwrite,
    /// Skip the file, keep existing
    Skip,
}

/// Location of the config file when `--config` is not given
pub fn default_config_path() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(".config").join("zenodo-dl").join("config.toml"))
}

fn home_file(name: &str) -> PathBuf {
    home::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(name)
}

fn default_base_url() -> String {
    ZENODO_API.to_string()
}

fn default_user_agent() -> String {
    format!("zenodo-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_env_var() -> String {
    "ZENODO_TOKEN".to_string()
}

fn default_encrypted_path() -> PathBuf {
    home_file(".zenodo_token.enc")
}

fn default_plaintext_path() -> PathBuf {
    home_file(".zenodo_token")
}

fn default_kdf_iterations() -> u32 {
    10_000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
