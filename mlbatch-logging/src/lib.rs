//! Logging initialization for mlbatch
//!
//! All crates log through `tracing`; this crate installs the subscriber once
//! per process. Output goes to stderr so that stdout stays available for
//! machine readable results.

pub mod init;

pub use init::{init_logging_from_config, init_simple_tracing};
