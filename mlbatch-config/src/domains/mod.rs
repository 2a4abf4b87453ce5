//! Domain-specific configuration modules

pub mod cluster;
pub mod execution;
pub mod logging;
pub mod store;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main mlbatch configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MlbatchConfig {
    /// Batch execution configuration
    pub execution: execution::ExecutionConfig,

    /// Status/result store configuration
    pub store: store::StoreConfig,

    /// Cluster launch configuration
    pub cluster: cluster::ClusterConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,
}

impl MlbatchConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.execution.validate()?;
        self.store.validate()?;
        self.cluster.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = MlbatchConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
