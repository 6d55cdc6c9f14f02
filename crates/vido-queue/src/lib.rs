//! Redis-backed workflow infrastructure for Vido.
//!
//! - [`queue`]: the workflow job stream (enqueue, consume, ack, DLQ)
//! - [`run_store`]: captured step results and the in-flight guard

pub mod error;
pub mod queue;
pub mod run_store;

pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, WorkflowQueue};
pub use run_store::{MemoryRunStore, RedisRunStore, RunStore};
