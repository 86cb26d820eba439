//! Typed gallery configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "tecknian";
const APP_NAME: &str = "streamgallery";
const CONFIG_FILE_NAME: &str = "streamgallery.toml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform directory could be determined for defaults.
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    /// Filesystem failure reading the config file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML.
    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    /// A field failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Immutable gallery configuration, validated once at construction.
///
/// All limits come from the deployment environment rather than the call
/// sites; the manager, store, and cache each take the pieces they need at
/// construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Root directory for original and thumbnail assets plus the index.
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,

    /// Root directory for the disk cache tier.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Record-count ceiling per stream.
    #[serde(default = "default_max_images_per_stream")]
    pub max_images_per_stream: usize,

    /// Maximum accepted upload size in megabytes.
    #[serde(default = "default_max_upload_size_mb")]
    pub max_upload_size_mb: u64,

    /// Memory-tier byte budget in megabytes, shared across namespaces.
    #[serde(default = "default_cache_max_memory_mb")]
    pub cache_max_memory_mb: u64,

    /// Memory-tier entry lifetime in hours.
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,

    /// File extensions accepted for upload, matched against the format
    /// sniffed from content bytes.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Upper bound in seconds for decoding a single upload.
    #[serde(default = "default_decode_timeout_secs")]
    pub decode_timeout_secs: u64,
}

impl GalleryConfig {
    /// Loads configuration from a TOML file, falling back to defaults for
    /// missing fields, and validates the result.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed, or if a
    /// field fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            info!(path = %path.display(), "No config file found, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the default config file path for this platform.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Checks every field once; a config that passes never needs
    /// re-checking at call sites.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_images_per_stream == 0 {
            return Err(ConfigError::Invalid(
                "max_images_per_stream must be at least 1".to_string(),
            ));
        }
        if self.max_upload_size_mb == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_size_mb must be at least 1".to_string(),
            ));
        }
        if self.cache_max_memory_mb == 0 {
            return Err(ConfigError::Invalid(
                "cache_max_memory_mb must be at least 1".to_string(),
            ));
        }
        if self.cache_ttl_hours == 0 {
            return Err(ConfigError::Invalid(
                "cache_ttl_hours must be at least 1".to_string(),
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "allowed_extensions must not be empty".to_string(),
            ));
        }
        if self.decode_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "decode_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum upload size in bytes.
    #[must_use]
    pub const fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }

    /// Memory-tier budget in bytes.
    #[must_use]
    pub const fn cache_max_bytes(&self) -> u64 {
        self.cache_max_memory_mb * 1024 * 1024
    }

    /// Memory-tier entry lifetime.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }

    /// Bound on a single decode task.
    #[must_use]
    pub const fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_secs)
    }

    /// Returns true if `extension` (lowercase, without dot) is accepted.
    #[must_use]
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            images_dir: default_images_dir(),
            cache_dir: default_cache_dir(),
            max_images_per_stream: default_max_images_per_stream(),
            max_upload_size_mb: default_max_upload_size_mb(),
            cache_max_memory_mb: default_cache_max_memory_mb(),
            cache_ttl_hours: default_cache_ttl_hours(),
            allowed_extensions: default_allowed_extensions(),
            decode_timeout_secs: default_decode_timeout_secs(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
}

fn default_images_dir() -> PathBuf {
    project_dirs().map_or_else(
        || std::env::temp_dir().join("streamgallery").join("images"),
        |dirs| dirs.data_dir().join("stream_images"),
    )
}

fn default_cache_dir() -> PathBuf {
    project_dirs().map_or_else(
        || std::env::temp_dir().join("streamgallery").join("cache"),
        |dirs| dirs.cache_dir().join("image_cache"),
    )
}

fn default_max_images_per_stream() -> usize {
    50
}

fn default_max_upload_size_mb() -> u64 {
    20
}

fn default_cache_max_memory_mb() -> u64 {
    500
}

fn default_cache_ttl_hours() -> u64 {
    24
}

fn default_allowed_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "webp", "bmp"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_decode_timeout_secs() -> u64 {
    10
}
