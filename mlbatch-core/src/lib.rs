//! Core domain models for mlbatch
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace: jobs and their specifications, job results, job statuses and
//! the options that control a batch dispatch. It has no runtime
//! dependencies beyond serde and hashing.

pub mod job;
pub mod options;
pub mod result;
pub mod status;

pub use job::{Job, JobSpec, STORE_URL_PREFIX};
pub use options::BatchOptions;
pub use result::{JobResult, JobTiming};
pub use status::{JobStatus, ParseStatusError};
