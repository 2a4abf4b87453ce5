//! Configuration loading and environment variable handling

use crate::domains::store::StoreBackend;
use crate::domains::MlbatchConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "MLBATCH".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<MlbatchConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: MlbatchConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<MlbatchConfig> {
        let mut config = MlbatchConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<MlbatchConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut MlbatchConfig) -> ConfigResult<()> {
        self.apply_execution_overrides(&mut config.execution)?;
        self.apply_store_overrides(&mut config.store)?;
        self.apply_cluster_overrides(&mut config.cluster)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_execution_overrides(
        &self,
        config: &mut crate::domains::execution::ExecutionConfig,
    ) -> ConfigResult<()> {
        if let Ok(workers) = self.get_env_var("CACHE_PRECHECK_WORKERS") {
            config.cache_precheck_workers = workers.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid CACHE_PRECHECK_WORKERS: {}", e))
            })?;
        }

        if let Ok(workers) = self.get_env_var("DEFAULT_WORKERS") {
            let workers: usize = workers
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid DEFAULT_WORKERS: {}", e)))?;
            config.default_workers = Some(workers);
        }

        if let Ok(key) = self.get_env_var("JOB_CACHE_KEY") {
            config.job_cache_key = key;
        }

        Ok(())
    }

    fn apply_store_overrides(
        &self,
        config: &mut crate::domains::store::StoreConfig,
    ) -> ConfigResult<()> {
        if let Ok(backend) = self.get_env_var("STORE_BACKEND") {
            config.backend = match backend.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "file" => match &config.backend {
                    StoreBackend::File { .. } => config.backend.clone(),
                    StoreBackend::Memory => StoreBackend::default(),
                },
                other => {
                    return Err(ConfigError::EnvError(format!(
                        "Invalid STORE_BACKEND: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(root) = self.get_env_var("STORE_ROOT") {
            config.backend = StoreBackend::File {
                root: PathBuf::from(root),
            };
        }

        if let Ok(attempts) = self.get_env_var("STORE_READ_ATTEMPTS") {
            config.read_attempts = attempts.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid STORE_READ_ATTEMPTS: {}", e))
            })?;
        }

        Ok(())
    }

    fn apply_cluster_overrides(
        &self,
        config: &mut crate::domains::cluster::ClusterConfig,
    ) -> ConfigResult<()> {
        if let Ok(launcher) = self.get_env_var("CLUSTER_LAUNCHER") {
            config.launcher = launcher;
        }

        if let Ok(scratch) = self.get_env_var("SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(scratch);
        }

        if let Ok(program) = self.get_env_var("WORKER_PROGRAM") {
            config.worker_program = Some(PathBuf::from(program));
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
