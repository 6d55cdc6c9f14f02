//! HTTP handlers.

pub mod videos;
pub mod webhook;
pub mod workflows;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Readiness probe: checks the queue connection.
pub async fn ready(State(state): State<AppState>) -> Json<Value> {
    let queue_ok = state.queue.len().await.is_ok();
    Json(json!({
        "status": if queue_ok { "ready" } else { "degraded" },
        "queue": queue_ok,
    }))
}
