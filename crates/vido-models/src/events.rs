//! Provider webhook event payloads.
//!
//! The provider posts `{type, data}` JSON; `type` selects the shape of
//! `data`. The set of event types we act on is closed and matched
//! exhaustively; anything else deserializes into [`WebhookEvent::Unknown`]
//! and is acknowledged without side effects so the provider does not keep
//! retrying event types we do not care about.

use serde::{Deserialize, Serialize};

/// A webhook event from the media-processing provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WebhookEvent {
    #[serde(rename = "video.asset.created")]
    AssetCreated(AssetCreated),

    #[serde(rename = "video.asset.ready")]
    AssetReady(AssetReady),

    #[serde(rename = "video.asset.errored")]
    AssetErrored(AssetErrored),

    #[serde(rename = "video.asset.track.ready")]
    AssetTrackReady(AssetTrackReady),

    /// Well-formed event of a type we do not handle.
    #[serde(other)]
    Unknown,
}

impl WebhookEvent {
    /// Event type tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookEvent::AssetCreated(_) => "video.asset.created",
            WebhookEvent::AssetReady(_) => "video.asset.ready",
            WebhookEvent::AssetErrored(_) => "video.asset.errored",
            WebhookEvent::AssetTrackReady(_) => "video.asset.track.ready",
            WebhookEvent::Unknown => "unknown",
        }
    }
}

/// `video.asset.created` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetCreated {
    /// Provider asset ID
    pub id: String,
    /// Upload this asset was created from
    #[serde(default)]
    pub upload_id: Option<String>,
    /// Provider-side status string
    #[serde(default)]
    pub status: Option<String>,
}

/// A playback reference inside a `ready` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackRef {
    pub id: String,
    #[serde(default)]
    pub policy: Option<String>,
}

/// `video.asset.ready` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetReady {
    /// Provider asset ID
    pub id: String,
    /// Upload this asset was created from
    #[serde(default)]
    pub upload_id: Option<String>,
    /// Playback IDs; the first one drives the derived URLs
    #[serde(default)]
    pub playback_ids: Vec<PlaybackRef>,
    /// Duration in fractional seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl AssetReady {
    /// First playback ID, if the provider sent any.
    pub fn playback_id(&self) -> Option<&str> {
        self.playback_ids.first().map(|p| p.id.as_str())
    }

    /// Provider duration (fractional seconds) rounded to integer
    /// milliseconds; missing duration is reported as 0.
    pub fn duration_ms(&self) -> i64 {
        match self.duration {
            Some(seconds) => (seconds * 1000.0).round() as i64,
            None => 0,
        }
    }
}

/// `video.asset.errored` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetErrored {
    /// Provider asset ID
    pub id: String,
    #[serde(default)]
    pub upload_id: Option<String>,
    /// Provider error messages, if any
    #[serde(default)]
    pub errors: Option<AssetErrors>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetErrors {
    #[serde(default)]
    pub messages: Vec<String>,
}

/// `video.asset.track.ready` payload. References the asset by `asset_id`
/// because tracks are provider objects of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetTrackReady {
    /// Provider track ID
    pub id: String,
    /// Asset the track belongs to
    #[serde(default)]
    pub asset_id: Option<String>,
    /// Track status string
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_ready_event() {
        let body = r#"{
            "type": "video.asset.ready",
            "data": {
                "id": "asset_1",
                "upload_id": "up_1",
                "playback_ids": [{"id": "pb_1", "policy": "public"}],
                "duration": 12.345,
                "status": "ready"
            }
        }"#;

        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        match event {
            WebhookEvent::AssetReady(data) => {
                assert_eq!(data.playback_id(), Some("pb_1"));
                assert_eq!(data.duration_ms(), 12345);
                assert_eq!(data.upload_id.as_deref(), Some("up_1"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_duration_rounds_not_truncates() {
        let data = AssetReady {
            id: "a".into(),
            upload_id: None,
            playback_ids: vec![],
            duration: Some(1.9996),
            status: None,
        };
        assert_eq!(data.duration_ms(), 2000);
    }

    #[test]
    fn test_missing_duration_is_zero() {
        let data = AssetReady {
            id: "a".into(),
            upload_id: None,
            playback_ids: vec![],
            duration: None,
            status: None,
        };
        assert_eq!(data.duration_ms(), 0);
    }

    #[test]
    fn test_unhandled_type_is_unknown() {
        let body = r#"{"type": "video.upload.cancelled", "data": {"id": "up_9"}}"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert!(matches!(event, WebhookEvent::Unknown));
    }

    #[test]
    fn test_malformed_body_is_error() {
        assert!(serde_json::from_str::<WebhookEvent>(r#"{"data": {}}"#).is_err());
    }
}
