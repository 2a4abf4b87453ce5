//! Resilience patterns for mlbatch
//!
//! Retry policies used by the status/result store consistency protocol,
//! backoff calculation, and escalating termination of worker processes.

pub mod backoff;
pub mod retry;
pub mod shutdown;

pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
pub use shutdown::{ProcessShutdownManager, ShutdownError};
