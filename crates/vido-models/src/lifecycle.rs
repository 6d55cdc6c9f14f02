//! Video lifecycle state machine.
//!
//! Maps each provider event to one absolute row patch. Patches are
//! value-sets, never increments, so redelivering an identical event
//! produces an identical row (at-least-once delivery safe). Primary status
//! moves through [`crate::VideoStatus::advance`] and can therefore never go
//! backwards, while a `track.ready` event touches nothing but the track
//! field.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{AssetCreated, AssetErrored, AssetReady, AssetTrackReady, WebhookEvent};
use crate::video::{TrackStatus, VideoAsset, VideoStatus};

/// Lifecycle validation failures. All map to a 400 at the webhook edge;
/// retrying is the provider's job.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("event has no upload_id")]
    MissingUploadId,

    #[error("event has no asset_id")]
    MissingAssetId,

    #[error("ready event has no playback ids")]
    MissingPlaybackId,
}

/// Which field the webhook handler must use to locate the row.
///
/// Asset events correlate by the upload they came from; track events only
/// carry the provider asset ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    UploadId(String),
    AssetId(String),
}

impl LookupKey {
    /// Extract the correlation key for an event, validating the required
    /// field is present. `Unknown` events have no correlation and yield
    /// `Ok(None)`; the handler acknowledges them without a lookup.
    pub fn for_event(event: &WebhookEvent) -> Result<Option<LookupKey>, LifecycleError> {
        match event {
            WebhookEvent::AssetCreated(d) => upload_key(d.upload_id.as_deref()).map(Some),
            WebhookEvent::AssetReady(d) => upload_key(d.upload_id.as_deref()).map(Some),
            WebhookEvent::AssetErrored(d) => upload_key(d.upload_id.as_deref()).map(Some),
            WebhookEvent::AssetTrackReady(d) => d
                .asset_id
                .as_deref()
                .map(|id| Some(LookupKey::AssetId(id.to_string())))
                .ok_or(LifecycleError::MissingAssetId),
            WebhookEvent::Unknown => Ok(None),
        }
    }
}

fn upload_key(upload_id: Option<&str>) -> Result<LookupKey, LifecycleError> {
    upload_id
        .map(|id| LookupKey::UploadId(id.to_string()))
        .ok_or(LifecycleError::MissingUploadId)
}

/// Absolute field-set produced by the state machine. `None` means
/// "leave the field alone"; the store writes only the set fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoPatch {
    pub status: Option<VideoStatus>,
    pub asset_id: Option<String>,
    pub playback_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub duration_ms: Option<i64>,
    pub track_status: Option<TrackStatus>,
}

impl VideoPatch {
    /// Build the patch for an already-located row. The caller has resolved
    /// the [`LookupKey`]; this function only decides what changes.
    pub fn for_event(
        row: &VideoAsset,
        event: &WebhookEvent,
        image_base: &str,
    ) -> Result<VideoPatch, LifecycleError> {
        match event {
            WebhookEvent::AssetCreated(d) => Ok(Self::from_created(row, d)),
            WebhookEvent::AssetReady(d) => Self::from_ready(row, d, image_base),
            WebhookEvent::AssetErrored(d) => Ok(Self::from_errored(row, d)),
            WebhookEvent::AssetTrackReady(d) => Ok(Self::from_track_ready(d)),
            WebhookEvent::Unknown => Ok(VideoPatch::default()),
        }
    }

    /// `created`: record the provider asset and advance to processing.
    pub fn from_created(row: &VideoAsset, data: &AssetCreated) -> VideoPatch {
        VideoPatch {
            status: Some(row.status.advance(VideoStatus::Processing)),
            asset_id: Some(data.id.clone()),
            ..Default::default()
        }
    }

    /// `ready`: one atomic patch covering status, playback, derived URLs
    /// and duration.
    pub fn from_ready(
        row: &VideoAsset,
        data: &AssetReady,
        image_base: &str,
    ) -> Result<VideoPatch, LifecycleError> {
        let playback_id = data.playback_id().ok_or(LifecycleError::MissingPlaybackId)?;

        Ok(VideoPatch {
            status: Some(row.status.advance(VideoStatus::Ready)),
            asset_id: Some(data.id.clone()),
            playback_id: Some(playback_id.to_string()),
            thumbnail_url: Some(thumbnail_url(image_base, playback_id)),
            preview_url: Some(preview_url(image_base, playback_id)),
            duration_ms: Some(data.duration_ms()),
            ..Default::default()
        })
    }

    /// `errored`: status only.
    pub fn from_errored(row: &VideoAsset, _data: &AssetErrored) -> VideoPatch {
        VideoPatch {
            status: Some(row.status.advance(VideoStatus::Errored)),
            ..Default::default()
        }
    }

    /// `track.ready`: the track field and nothing else.
    pub fn from_track_ready(data: &AssetTrackReady) -> VideoPatch {
        let status = data
            .status
            .as_deref()
            .map(TrackStatus::from_provider)
            .unwrap_or(TrackStatus::Ready);
        VideoPatch {
            track_status: Some(status),
            ..Default::default()
        }
    }

    /// Apply the patch in memory. The document store mirrors this exactly
    /// through a field-masked write.
    pub fn apply_to(&self, row: &mut VideoAsset) {
        if let Some(status) = self.status {
            row.status = status;
        }
        if let Some(asset_id) = &self.asset_id {
            row.asset_id = Some(asset_id.clone());
        }
        if let Some(playback_id) = &self.playback_id {
            row.playback_id = Some(playback_id.clone());
        }
        if let Some(thumbnail_url) = &self.thumbnail_url {
            row.thumbnail_url = Some(thumbnail_url.clone());
        }
        if let Some(preview_url) = &self.preview_url {
            row.preview_url = Some(preview_url.clone());
        }
        if let Some(duration_ms) = self.duration_ms {
            row.duration_ms = duration_ms;
        }
        if let Some(track_status) = self.track_status {
            row.track_status = Some(track_status);
        }
    }
}

/// Thumbnail URL template over the provider image service.
pub fn thumbnail_url(image_base: &str, playback_id: &str) -> String {
    format!("{}/{}/thumbnail.jpg", image_base.trim_end_matches('/'), playback_id)
}

/// Animated preview URL template over the provider image service.
pub fn preview_url(image_base: &str, playback_id: &str) -> String {
    format!("{}/{}/animated.gif", image_base.trim_end_matches('/'), playback_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlaybackRef;

    const IMAGE_BASE: &str = "https://image.mux.com";

    fn row() -> VideoAsset {
        VideoAsset::new_upload("user_1", "up_1")
    }

    fn ready_event() -> AssetReady {
        AssetReady {
            id: "asset_1".into(),
            upload_id: Some("up_1".into()),
            playback_ids: vec![PlaybackRef {
                id: "pb_1".into(),
                policy: Some("public".into()),
            }],
            duration: Some(12.345),
            status: Some("ready".into()),
        }
    }

    #[test]
    fn test_ready_derives_all_fields() {
        let mut video = row();
        let patch = VideoPatch::from_ready(&video, &ready_event(), IMAGE_BASE).unwrap();
        patch.apply_to(&mut video);

        assert_eq!(video.status, VideoStatus::Ready);
        assert_eq!(video.playback_id.as_deref(), Some("pb_1"));
        assert_eq!(video.duration_ms, 12345);
        assert_eq!(
            video.thumbnail_url.as_deref(),
            Some("https://image.mux.com/pb_1/thumbnail.jpg")
        );
        assert_eq!(
            video.preview_url.as_deref(),
            Some("https://image.mux.com/pb_1/animated.gif")
        );
        assert_eq!(video.asset_id.as_deref(), Some("asset_1"));
    }

    #[test]
    fn test_ready_is_idempotent() {
        let mut once = row();
        VideoPatch::from_ready(&once, &ready_event(), IMAGE_BASE)
            .unwrap()
            .apply_to(&mut once);

        let mut twice = row();
        VideoPatch::from_ready(&twice, &ready_event(), IMAGE_BASE)
            .unwrap()
            .apply_to(&mut twice);
        VideoPatch::from_ready(&twice, &ready_event(), IMAGE_BASE)
            .unwrap()
            .apply_to(&mut twice);

        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn test_track_ready_preserves_ready_fields() {
        let mut video = row();
        VideoPatch::from_ready(&video, &ready_event(), IMAGE_BASE)
            .unwrap()
            .apply_to(&mut video);
        let before = video.clone();

        let track = AssetTrackReady {
            id: "track_1".into(),
            asset_id: Some("asset_1".into()),
            status: Some("ready".into()),
        };
        VideoPatch::from_track_ready(&track).apply_to(&mut video);

        assert_eq!(video.track_status, Some(TrackStatus::Ready));
        assert_eq!(video.status, before.status);
        assert_eq!(video.playback_id, before.playback_id);
        assert_eq!(video.thumbnail_url, before.thumbnail_url);
        assert_eq!(video.preview_url, before.preview_url);
        assert_eq!(video.duration_ms, before.duration_ms);
    }

    #[test]
    fn test_replayed_created_after_ready_keeps_status() {
        let mut video = row();
        VideoPatch::from_ready(&video, &ready_event(), IMAGE_BASE)
            .unwrap()
            .apply_to(&mut video);

        let created = AssetCreated {
            id: "asset_1".into(),
            upload_id: Some("up_1".into()),
            status: Some("preparing".into()),
        };
        VideoPatch::from_created(&video, &created).apply_to(&mut video);

        assert_eq!(video.status, VideoStatus::Ready);
    }

    #[test]
    fn test_ready_without_playback_id_fails() {
        let data = AssetReady {
            playback_ids: vec![],
            ..ready_event()
        };
        assert_eq!(
            VideoPatch::from_ready(&row(), &data, IMAGE_BASE),
            Err(LifecycleError::MissingPlaybackId)
        );
    }

    #[test]
    fn test_lookup_key_requires_upload_id() {
        let event = WebhookEvent::AssetCreated(AssetCreated {
            id: "asset_1".into(),
            upload_id: None,
            status: None,
        });
        assert_eq!(
            LookupKey::for_event(&event),
            Err(LifecycleError::MissingUploadId)
        );
    }

    #[test]
    fn test_unknown_event_has_no_lookup() {
        assert_eq!(LookupKey::for_event(&WebhookEvent::Unknown), Ok(None));
    }

    #[test]
    fn test_track_lookup_uses_asset_id() {
        let event = WebhookEvent::AssetTrackReady(AssetTrackReady {
            id: "track_1".into(),
            asset_id: Some("asset_1".into()),
            status: Some("ready".into()),
        });
        assert_eq!(
            LookupKey::for_event(&event).unwrap(),
            Some(LookupKey::AssetId("asset_1".into()))
        );
    }
}
