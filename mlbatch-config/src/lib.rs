//! Domain-driven configuration management for mlbatch
//!
//! Configuration is split by functional domain (execution, store, cluster,
//! logging), loaded from YAML with `MLBATCH_*` environment overrides and
//! validated per domain.

pub mod error;
pub mod loader;
pub mod validation;

pub mod domains;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

pub use domains::{
    cluster::ClusterConfig,
    execution::ExecutionConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    store::{StoreBackend, StoreConfig},
    MlbatchConfig,
};
