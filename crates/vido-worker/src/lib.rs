//! Vido workflow worker.
//!
//! Executes derived-asset workflow runs: an ordered, memoized step
//! sequence per job kind, resumable after crashes, with bounded retry.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod processor;
pub mod workflow;

pub use collaborators::{Generator, JobContext, ObjectStore, ProviderGenerator, VideoStore};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::RunExecutor;
pub use workflow::RunContext;
