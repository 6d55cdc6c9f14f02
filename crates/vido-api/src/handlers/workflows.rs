//! Workflow trigger and status polling.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use vido_models::{JobKind, RunId, RunStatus, VideoId, WorkflowJob};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Trigger request body.
#[derive(Debug, Deserialize, Validate)]
pub struct TriggerRequest {
    /// Generation prompt (thumbnail jobs)
    #[validate(length(min = 1, max = 5000))]
    pub prompt: Option<String>,
}

/// Trigger response: the accepted run. Execution is out of band;
/// completion is observed by polling the row.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub run_id: RunId,
}

/// `POST /api/videos/{video_id}/workflows/{kind}`
pub async fn trigger_workflow(
    State(state): State<AppState>,
    user: AuthUser,
    Path((video_id, kind)): Path<(String, String)>,
    Json(request): Json<TriggerRequest>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let kind: JobKind = kind
        .parse()
        .map_err(|e: vido_models::job::UnknownJobKind| ApiError::bad_request(e.to_string()))?;
    let video_id = VideoId::from_string(video_id);

    // Not found also covers rows owned by someone else
    state
        .videos
        .get_owned(&video_id, &user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {}", video_id)))?;

    let mut job = WorkflowJob::new(user.user_id.clone(), video_id.clone(), kind);
    if let Some(prompt) = request.prompt {
        job = job.with_prompt(prompt);
    }

    // One live run per (video, kind); a second trigger while one is in
    // flight is a conflict, not a cheap re-trigger.
    let acquired = state
        .run_store
        .acquire_guard(&video_id, kind, &job.run_id, state.config.guard_ttl)
        .await?;
    if !acquired {
        return Err(ApiError::conflict(format!(
            "a {} run is already in flight for video {}",
            kind, video_id
        )));
    }

    state
        .videos
        .set_job_outcome(&video_id, kind, RunStatus::Queued, None)
        .await?;

    if let Err(e) = state.queue.enqueue(&job).await {
        // Undo the lease so the caller can retry the trigger
        state
            .run_store
            .release_guard(&video_id, kind, &job.run_id)
            .await
            .ok();
        return Err(e.into());
    }

    info!(run_id = %job.run_id, kind = %kind, video_id = %video_id, "Workflow accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse { run_id: job.run_id }),
    ))
}

/// Row fields a poller cares about.
#[derive(Debug, Serialize)]
pub struct VideoStatusResponse {
    pub video_id: VideoId,
    pub status: vido_models::VideoStatus,
    pub thumbnail_url: Option<String>,
    pub last_job_kind: Option<JobKind>,
    pub last_job_status: Option<RunStatus>,
    pub last_job_error: Option<String>,
}

/// `GET /api/videos/{video_id}/status`
pub async fn video_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoStatusResponse>> {
    let video_id = VideoId::from_string(video_id);
    let video = state
        .videos
        .get_owned(&video_id, &user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {}", video_id)))?;

    Ok(Json(VideoStatusResponse {
        video_id: video.id,
        status: video.status,
        thumbnail_url: video.thumbnail_url,
        last_job_kind: video.last_job_kind,
        last_job_status: video.last_job_status,
        last_job_error: video.last_job_error,
    }))
}
