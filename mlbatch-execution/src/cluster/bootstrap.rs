//! Worker bootstrap script

use std::path::{Path, PathBuf};

/// Command line of one cluster worker process
#[derive(Debug, Clone)]
pub struct WorkerBootstrap {
    pub program: PathBuf,
    pub jobs_file: PathBuf,
    pub index_file: PathBuf,
    pub store_config: PathBuf,
    pub result_key: String,
    pub status_key: Option<String>,
    pub halt_key: Option<String>,
    pub job_cache_key: Option<String>,
}

impl WorkerBootstrap {
    /// Arguments passed to the worker program
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "worker".to_string(),
            "--jobs".to_string(),
            path_arg(&self.jobs_file),
            "--index-file".to_string(),
            path_arg(&self.index_file),
            "--store-config".to_string(),
            path_arg(&self.store_config),
            "--result-key".to_string(),
            self.result_key.clone(),
        ];
        let optional = [
            ("--status-key", &self.status_key),
            ("--halt-key", &self.halt_key),
            ("--job-cache-key", &self.job_cache_key),
        ];
        for (flag, value) in optional {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value.clone());
            }
        }
        args
    }

    /// Bash script that replaces itself with the worker program
    pub fn render(&self) -> String {
        let mut line = vec![quote(&path_arg(&self.program))];
        line.extend(self.args().iter().map(|arg| quote(arg)));
        format!("#!/bin/bash\nset -e\nexec {}\n", line.join(" "))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Single-quote `value` for bash
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrap() -> WorkerBootstrap {
        WorkerBootstrap {
            program: PathBuf::from("/opt/bin/mlbatch"),
            jobs_file: PathBuf::from("/scratch/jobs.json"),
            index_file: PathBuf::from("/scratch/index.txt"),
            store_config: PathBuf::from("/scratch/store.yaml"),
            result_key: "results".to_string(),
            status_key: None,
            halt_key: Some("it's over".to_string()),
            job_cache_key: None,
        }
    }

    #[test]
    fn test_args_include_only_set_keys() {
        let args = bootstrap().args();
        assert_eq!(args[0], "worker");
        assert!(args.contains(&"--halt-key".to_string()));
        assert!(!args.contains(&"--status-key".to_string()));
        assert!(!args.contains(&"--job-cache-key".to_string()));
    }

    #[test]
    fn test_render_quotes_arguments() {
        let script = bootstrap().render();
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("exec '/opt/bin/mlbatch' 'worker' '--jobs' '/scratch/jobs.json'"));
        assert!(script.contains(r"'it'\''s over'"));
    }
}
