//! mlbatch execution engine
//!
//! Runs batches of independent jobs sequentially, on a bounded local pool,
//! or fanned out over cluster worker processes that pull job indices from a
//! shared counter file and report through the status/result store.

pub mod allocator;
pub mod cluster;
pub mod context;
pub mod error;
pub mod executor;
pub mod handler;
pub mod orchestrator;

// Re-export main types
pub use allocator::WorkIndexAllocator;
pub use cluster::{ClusterLauncher, ClusterSpec, HALTED_EXIT_CODE};
pub use context::ExecutionContext;
pub use error::ExecutionError;
pub use executor::JobExecutor;
pub use handler::{ClusterHandler, JobHandler, LocalShellHandler, PoolHandler};
pub use orchestrator::BatchOrchestrator;
