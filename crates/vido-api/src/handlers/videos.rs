//! Paginated video listings.
//!
//! Both endpoints ride the same keyset engine; only the scoping filter
//! differs. Cursors travel as opaque tokens.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use vido_firestore::{clamp_limit, VideoScope};
use vido_models::{Cursor, VideoAsset, Visibility};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Common list query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Opaque cursor from a previous page
    pub cursor: Option<String>,
    /// Page size (1-100, default 25)
    pub limit: Option<u32>,
    /// Category filter (browse feed)
    pub category_id: Option<String>,
    /// Title prefix search (browse feed)
    pub query: Option<String>,
}

/// One page of videos.
#[derive(Debug, Serialize)]
pub struct VideoPage {
    pub items: Vec<VideoAsset>,
    /// Token for the next page; null when exhausted
    pub next_cursor: Option<String>,
}

fn decode_cursor(params: &ListParams) -> ApiResult<Option<Cursor>> {
    match &params.cursor {
        None => Ok(None),
        Some(token) => Cursor::decode(token)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request("invalid cursor")),
    }
}

async fn list(state: &AppState, scope: VideoScope, params: &ListParams) -> ApiResult<VideoPage> {
    let cursor = decode_cursor(params)?;
    let limit = clamp_limit(params.limit);

    let page = state
        .videos
        .list_page(scope, cursor.as_ref(), limit)
        .await?;

    Ok(VideoPage {
        items: page.items,
        next_cursor: page.next_cursor.map(|c| c.encode()),
    })
}

/// `GET /api/studio/videos` — the caller's own videos.
pub async fn list_studio_videos(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<VideoPage>> {
    let scope = VideoScope {
        owner_id: Some(user.user_id),
        ..VideoScope::default()
    };
    Ok(Json(list(&state, scope, &params).await?))
}

/// `GET /api/videos` — public browse feed with optional category and
/// title-prefix search.
pub async fn list_public_videos(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<VideoPage>> {
    let scope = VideoScope {
        visibility: Some(Visibility::Public),
        category_id: params.category_id.clone(),
        query: params.query.clone().filter(|q| !q.trim().is_empty()),
        ..VideoScope::default()
    };
    Ok(Json(list(&state, scope, &params).await?))
}
