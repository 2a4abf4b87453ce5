//! Status/result store configuration

use crate::error::{ConfigError, ConfigResult};
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Key-value store backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreBackend {
    /// Directory database shared through the filesystem
    File { root: PathBuf },
    /// Process-local store, unusable for cluster dispatch
    Memory,
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::File {
            root: default_store_root(),
        }
    }
}

/// Store configuration, including the consistency retry budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Attempts of a result write whose read-back comes back empty
    pub write_attempts: u32,

    /// Attempts of a result read while draining cluster results
    pub read_attempts: u32,

    /// Delay between result read attempts
    #[serde(with = "humantime_serde")]
    pub read_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            write_attempts: 3,
            read_attempts: 3,
            read_backoff: Duration::from_secs(1),
        }
    }
}

impl StoreConfig {
    /// File-backed store rooted at `root`
    pub fn file(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreBackend::File { root: root.into() },
            ..Self::default()
        }
    }

    /// In-memory store
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ..Self::default()
        }
    }

    pub fn with_read_backoff(mut self, backoff: Duration) -> Self {
        self.read_backoff = backoff;
        self
    }

    /// Read a standalone store configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as a standalone file
    pub fn write_yaml_file(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(ConfigError::from)
    }
}

impl Validatable for StoreConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.write_attempts, "write_attempts", self.domain_name())?;
        validate_positive(self.read_attempts, "read_attempts", self.domain_name())?;

        if let StoreBackend::File { root } = &self.backend {
            if root.as_os_str().is_empty() {
                return Err(self.validation_error("file store root cannot be empty"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "store"
    }
}

fn default_store_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".mlbatch")
        .join("database")
}
