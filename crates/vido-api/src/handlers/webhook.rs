//! Provider webhook endpoint.
//!
//! Flow: verify the signature over the raw bytes, parse the closed event
//! set, locate the referenced row, apply the state-machine patch. Every
//! failure is a 400 so the provider retries; unknown event types are a
//! 200 so it does not.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use chrono::Utc;
use tracing::{info, warn};

use vido_models::{LookupKey, VideoPatch, WebhookEvent};

use crate::error::{ApiError, ApiResult};
use crate::signature::SIGNATURE_HEADER;
use crate::state::AppState;

/// `POST /api/webhooks/video`
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<&'static str> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("no signature found"))?;

    state
        .verifier
        .verify(signature, &body, Utc::now())
        .map_err(|e| {
            warn!("Webhook signature rejected: {}", e);
            ApiError::bad_request(format!("invalid signature: {}", e))
        })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("malformed event: {}", e)))?;

    let Some(key) = LookupKey::for_event(&event)
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    else {
        // Well-formed but unhandled type: acknowledge so the provider
        // stops redelivering it.
        info!(kind = event.kind(), "Ignoring unhandled webhook event type");
        return Ok("ignored");
    };

    let row = match &key {
        LookupKey::UploadId(upload_id) => state.videos.find_by_upload_id(upload_id).await?,
        LookupKey::AssetId(asset_id) => state.videos.find_by_asset_id(asset_id).await?,
    };

    // Never create a row from an event; a foreign or replayed reference
    // is the sender's problem.
    let row = row.ok_or_else(|| ApiError::bad_request("unknown upload reference"))?;

    let patch = VideoPatch::for_event(&row, &event, &state.config.media_image_base_url)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    state.videos.apply_patch(&row.id, &patch).await?;

    info!(
        kind = event.kind(),
        video_id = %row.id,
        "Webhook event applied"
    );
    Ok("ok")
}
