//! Integration tests for mlbatch-config

use mlbatch_config::*;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use temp_env::with_vars;

#[test]
fn test_default_config_validation() {
    let config = MlbatchConfig::default();
    assert!(config.validate_all().is_ok());
    assert_eq!(config.execution.cache_precheck_workers, 20);
    assert_eq!(config.cluster.launcher, "srun");
    assert_eq!(config.store.write_attempts, 3);
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("MLBATCH_CACHE_PRECHECK_WORKERS", Some("8")),
        ("MLBATCH_STORE_ROOT", Some("/shared/mlbatch-db")),
        ("MLBATCH_CLUSTER_LAUNCHER", Some("/opt/slurm/bin/srun")),
        ("MLBATCH_LOG_LEVEL", Some("debug")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.execution.cache_precheck_workers, 8);
        assert_eq!(
            config.store.backend,
            StoreBackend::File {
                root: PathBuf::from("/shared/mlbatch-db")
            }
        );
        assert_eq!(config.cluster.launcher, "/opt/slurm/bin/srun");
        assert_eq!(config.logging.level, LogLevel::Debug);
    });
}

#[test]
fn test_invalid_env_value() {
    with_vars(vec![("MLBATCH_CACHE_PRECHECK_WORKERS", Some("many"))], || {
        let result = ConfigLoader::new().from_env();
        assert!(matches!(result, Err(ConfigError::EnvError(_))));
    });
}

#[test]
fn test_yaml_config_serialization() {
    let config = MlbatchConfig::default();
    let yaml = serde_yaml::to_string(&config).unwrap();

    let parsed: MlbatchConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
    assert_eq!(parsed.store, config.store);
}

#[test]
fn test_comprehensive_config() {
    let yaml = r#"
execution:
  cache_precheck_workers: 4
  default_workers: 2
store:
  backend:
    type: file
    root: /data/mlbatch
  read_backoff: 500ms
cluster:
  launcher: srun
  scratch_dir: /shared/scratch
  poll_interval: 2s
logging:
  level: warn
  format: json
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = ConfigLoader::with_prefix("MLBATCH_TEST_UNSET")
        .from_file(file.path())
        .unwrap();

    assert_eq!(config.execution.default_workers, Some(2));
    assert_eq!(config.store.read_backoff, Duration::from_millis(500));
    assert_eq!(config.cluster.scratch_dir, PathBuf::from("/shared/scratch"));
    assert_eq!(config.cluster.poll_interval, Duration::from_secs(2));
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_validation_rejects_zero_workers() {
    let yaml = "execution:\n  cache_precheck_workers: 0\n";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let result = ConfigLoader::with_prefix("MLBATCH_TEST_UNSET").from_file(file.path());
    assert!(matches!(result, Err(ConfigError::DomainError { .. })));
}
