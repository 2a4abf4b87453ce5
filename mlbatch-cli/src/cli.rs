//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mlbatch", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a batch of jobs
    Run(RunArgs),

    /// Pull jobs from a shared work index (started by the cluster bootstrap)
    #[command(hide = true)]
    Worker(WorkerArgs),

    /// Set or clear a halt signal
    Halt {
        /// Store key of the halt signal
        #[arg(long, value_name = "KEY")]
        key: String,

        /// Clear the signal instead of setting it
        #[arg(long)]
        clear: bool,
    },

    /// Show per-job statuses recorded under a key
    Status {
        /// Store key of the statuses
        #[arg(long, value_name = "KEY")]
        key: String,

        /// Number of jobs in the batch; lists only recorded statuses when omitted
        #[arg(long, value_name = "N")]
        count: Option<usize>,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// JSON file holding an array of jobs
    #[arg(long, value_name = "PATH")]
    pub jobs: PathBuf,

    /// Run on a local pool of this many workers
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Cluster resource spec (e.g. "-n 4 -c 2", or "fake")
    #[arg(long, value_name = "SPEC", allow_hyphen_values = true)]
    pub cluster: Option<String>,

    /// Batch label used in logs
    #[arg(long, value_name = "STRING")]
    pub label: Option<String>,

    #[arg(long, value_name = "KEY")]
    pub halt_key: Option<String>,

    #[arg(long, value_name = "KEY")]
    pub status_key: Option<String>,

    #[arg(long, value_name = "KEY")]
    pub result_key: Option<String>,

    /// Only report cached results, never execute
    #[arg(long)]
    pub cache_only: bool,

    /// Realize every declared input before running
    #[arg(long)]
    pub prefetch_inputs: bool,

    /// Write results here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct WorkerArgs {
    #[arg(long, value_name = "PATH")]
    pub jobs: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub index_file: PathBuf,

    /// Store configuration written by the launcher
    #[arg(long, value_name = "PATH")]
    pub store_config: PathBuf,

    #[arg(long, value_name = "KEY")]
    pub result_key: String,

    #[arg(long, value_name = "KEY")]
    pub status_key: Option<String>,

    #[arg(long, value_name = "KEY")]
    pub halt_key: Option<String>,

    #[arg(long, value_name = "KEY")]
    pub job_cache_key: Option<String>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print a sample configuration file
    Sample,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },
}
