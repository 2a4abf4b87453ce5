use anyhow::{anyhow, Context, Result};
use clap::Parser;
use mlbatch_config::{ConfigLoader, LogLevel, MlbatchConfig};
use mlbatch_execution::{ExecutionError, HALTED_EXIT_CODE};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, warn};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<MlbatchConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                loader
                    .from_file(path)
                    .with_context(|| format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

async fn dispatch(cli: Cli, config: MlbatchConfig) -> Result<()> {
    match cli.command {
        Commands::Run(args) => commands::run::run_batch(args, config).await,
        Commands::Worker(args) => commands::worker::run_worker(args, config).await,
        Commands::Halt { key, clear } => commands::store::halt(&key, clear, &config).await,
        Commands::Status { key, count } => commands::store::status(&key, count, &config).await,
        Commands::Config { config_cmd } => match config_cmd {
            ConfigCommands::Sample => {
                print!("{}", MlbatchConfig::generate_sample());
                Ok(())
            }
            ConfigCommands::Validate { config_file } => {
                ConfigLoader::new()
                    .from_file(&config_file)
                    .with_context(|| format!("Invalid configuration {:?}", config_file))?;
                println!("Configuration {:?} is valid", config_file);
                Ok(())
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.parse::<LogLevel>().map_err(|e| anyhow!(e))?;
    }

    // Logs go to stderr; stdout carries results
    mlbatch_logging::init_logging_from_config(&config.logging)?;
    info!("mlbatch {} starting", env!("CARGO_PKG_VERSION"));

    dispatch(cli, config).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let halted = e
                .downcast_ref::<ExecutionError>()
                .is_some_and(ExecutionError::is_halted);
            eprintln!("Error: {:#}", e);
            if halted {
                ExitCode::from(HALTED_EXIT_CODE as u8)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
