//! Shared data models for the Vido backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video asset rows and their lifecycle status
//! - Provider webhook events
//! - The lifecycle state machine (event -> row patch)
//! - Workflow jobs and run outcomes
//! - Pagination cursors

pub mod cursor;
pub mod events;
pub mod job;
pub mod lifecycle;
pub mod video;

// Re-export common types
pub use cursor::Cursor;
pub use events::{
    AssetCreated, AssetErrored, AssetReady, AssetTrackReady, PlaybackRef, WebhookEvent,
};
pub use job::{JobKind, RunId, RunStatus, WorkflowJob};
pub use lifecycle::{LifecycleError, LookupKey, VideoPatch};
pub use video::{TrackStatus, VideoAsset, VideoId, VideoStatus, Visibility};
