//! Escalating termination of external worker processes

use log::{error, info, warn};
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::timeout;

/// Shutdown error types
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// Waiting on or killing the process failed
    #[error("Process error: {0}")]
    ProcessError(String),

    /// Process still alive after SIGKILL
    #[error("Process unresponsive to termination")]
    Unresponsive,
}

/// Process shutdown manager for external processes
pub struct ProcessShutdownManager;

impl ProcessShutdownManager {
    /// Shutdown a process gracefully with escalating signals
    ///
    /// Sends SIGTERM (on Unix), waits up to `graceful_timeout`, then kills.
    /// A process that has already exited is simply reaped.
    pub async fn shutdown_process(
        child: &mut Child,
        graceful_timeout: Duration,
    ) -> Result<ExitStatus, ShutdownError> {
        if let Ok(Some(status)) = child.try_wait() {
            return Ok(status);
        }

        if let Some(id) = child.id() {
            info!("Initiating graceful shutdown for process {}", id);

            #[cfg(unix)]
            {
                use nix::sys::signal::{self, Signal};
                use nix::unistd::Pid;

                if let Err(e) = signal::kill(Pid::from_raw(id as i32), Signal::SIGTERM) {
                    warn!("Failed to send SIGTERM to process {}: {}", id, e);
                }
            }
        }

        match timeout(graceful_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                info!("Process terminated gracefully with status: {:?}", status);
                return Ok(status);
            }
            Ok(Err(e)) => {
                error!("Error waiting for process: {}", e);
            }
            Err(_) => {
                warn!("Process did not terminate gracefully within timeout");
            }
        }

        info!("Forcing process termination");
        if let Err(e) = child.kill().await {
            error!("Failed to kill process: {}", e);
            return Err(ShutdownError::ProcessError(e.to_string()));
        }

        match timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(status)) => {
                info!("Process terminated forcefully with status: {:?}", status);
                Ok(status)
            }
            Ok(Err(e)) => {
                error!("Error waiting for killed process: {}", e);
                Err(ShutdownError::ProcessError(e.to_string()))
            }
            Err(_) => {
                error!("Process did not terminate even after force kill");
                Err(ShutdownError::Unresponsive)
            }
        }
    }

    /// Shutdown multiple processes in parallel
    pub async fn shutdown_processes<'a, I>(
        children: I,
        graceful_timeout: Duration,
    ) -> Vec<Result<ExitStatus, ShutdownError>>
    where
        I: IntoIterator<Item = &'a mut Child>,
    {
        let futures = children
            .into_iter()
            .map(|child| Self::shutdown_process(child, graceful_timeout));

        futures::future::join_all(futures).await
    }
}
