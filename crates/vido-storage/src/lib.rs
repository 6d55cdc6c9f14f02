//! R2 object storage for Vido derived assets.

pub mod client;
pub mod error;
pub mod operations;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use operations::{thumbnail_key, StoredObject};
