//! Cluster dispatch
//!
//! The launcher writes the batch, a zeroed work counter, the store locator
//! and a bootstrap script into a scratch directory, starts the worker
//! processes through the workload manager and supervises them. Each worker
//! re-enters this program in worker mode and pulls job indices until the
//! batch is exhausted.

mod bootstrap;
mod launcher;
mod spec;

pub use bootstrap::WorkerBootstrap;
pub use launcher::ClusterLauncher;
pub use spec::ClusterSpec;

/// Exit code of a worker that stopped because the batch was halted
pub const HALTED_EXIT_CODE: i32 = 3;
