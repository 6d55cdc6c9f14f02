//! Video asset models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::job::{JobKind, RunStatus};

/// Unique identifier for a video asset row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Processing status reported by the media provider.
///
/// Only ever advances: `Waiting -> Processing -> {Ready, Errored}`.
/// Use [`VideoStatus::advance`] when applying provider events so a replayed
/// or out-of-order event can never move a row backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Upload created, provider has not seen bytes yet
    #[default]
    Waiting,
    /// Provider accepted the upload and is processing it
    Processing,
    /// Playable
    Ready,
    /// Provider failed to process the asset
    Errored,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Waiting => "waiting",
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Errored => "errored",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            VideoStatus::Waiting => 0,
            VideoStatus::Processing => 1,
            VideoStatus::Ready | VideoStatus::Errored => 2,
        }
    }

    /// Forward-only transition: returns `next` only if it is a real advance,
    /// otherwise keeps `self`.
    pub fn advance(self, next: VideoStatus) -> VideoStatus {
        if next.rank() > self.rank() {
            next
        } else {
            self
        }
    }

    /// Terminal states receive no further primary-status updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Ready | VideoStatus::Errored)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subtitle track status, updated independently of the primary status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Preparing,
    Ready,
    Errored,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Preparing => "preparing",
            TrackStatus::Ready => "ready",
            TrackStatus::Errored => "errored",
        }
    }

    /// Parse a provider status string, defaulting to `Preparing` for
    /// anything unrecognized.
    pub fn from_provider(s: &str) -> Self {
        match s {
            "ready" => TrackStatus::Ready,
            "errored" => TrackStatus::Errored,
            _ => TrackStatus::Preparing,
        }
    }
}

/// Row visibility in public feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }
}

/// A video asset row.
///
/// The webhook handler (system-trusted) locates rows by `upload_id` or
/// `asset_id` and may mutate any row; every user-initiated mutation is
/// scoped by `(id, owner_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoAsset {
    /// Unique row ID
    pub id: VideoId,

    /// Owning user
    pub owner_id: String,

    /// Title (user-editable; may be replaced by the title workflow)
    pub title: String,

    /// Description (user-editable; may be replaced by the description workflow)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Seeded category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,

    /// Provider upload ID (unique; webhook correlation key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,

    /// Provider asset ID, set once the provider creates the asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: VideoStatus,

    /// Provider playback ID, set when the asset is ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_id: Option<String>,

    /// Current thumbnail URL (provider-derived or workflow-generated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Object-store key of a workflow-generated thumbnail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,

    /// Animated preview URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,

    /// Subtitle track status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_status: Option<TrackStatus>,

    /// Duration in milliseconds
    #[serde(default)]
    pub duration_ms: i64,

    /// Public/private feed visibility
    #[serde(default)]
    pub visibility: Visibility,

    /// Kind of the most recently triggered workflow, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_job_kind: Option<JobKind>,

    /// Outcome of the most recently triggered workflow.
    ///
    /// Explicit so callers poll a real field instead of inferring success
    /// from the presence of derived-asset references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_job_status: Option<RunStatus>,

    /// Error message of the most recent failed workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_job_error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp (primary pagination sort key)
    pub updated_at: DateTime<Utc>,
}

impl VideoAsset {
    /// Create a fresh row for a newly created provider upload.
    pub fn new_upload(owner_id: impl Into<String>, upload_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: VideoId::new(),
            owner_id: owner_id.into(),
            title: "Untitled".to_string(),
            description: None,
            category_id: None,
            upload_id: Some(upload_id.into()),
            asset_id: None,
            status: VideoStatus::Waiting,
            playback_id: None,
            thumbnail_url: None,
            thumbnail_key: None,
            preview_url: None,
            track_status: None,
            duration_ms: 0,
            visibility: Visibility::Private,
            last_job_kind: None,
            last_job_status: None,
            last_job_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_advances_forward() {
        assert_eq!(
            VideoStatus::Waiting.advance(VideoStatus::Processing),
            VideoStatus::Processing
        );
        assert_eq!(
            VideoStatus::Processing.advance(VideoStatus::Ready),
            VideoStatus::Ready
        );
        assert_eq!(
            VideoStatus::Waiting.advance(VideoStatus::Errored),
            VideoStatus::Errored
        );
    }

    #[test]
    fn test_status_never_regresses() {
        assert_eq!(
            VideoStatus::Ready.advance(VideoStatus::Processing),
            VideoStatus::Ready
        );
        assert_eq!(
            VideoStatus::Ready.advance(VideoStatus::Errored),
            VideoStatus::Ready
        );
        assert_eq!(
            VideoStatus::Processing.advance(VideoStatus::Waiting),
            VideoStatus::Processing
        );
    }

    #[test]
    fn test_track_status_from_provider() {
        assert_eq!(TrackStatus::from_provider("ready"), TrackStatus::Ready);
        assert_eq!(TrackStatus::from_provider("errored"), TrackStatus::Errored);
        assert_eq!(
            TrackStatus::from_provider("something_else"),
            TrackStatus::Preparing
        );
    }
}
