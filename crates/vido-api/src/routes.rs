//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::videos::{list_public_videos, list_studio_videos};
use crate::handlers::webhook::receive_webhook;
use crate::handlers::workflows::{trigger_workflow, video_status};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        // Provider webhook (signature-authenticated)
        .route("/webhooks/video", post(receive_webhook))
        // Workflow trigger + polling surface
        .route("/videos/:video_id/workflows/:kind", post(trigger_workflow))
        .route("/videos/:video_id/status", get(video_status))
        // Paginated collections
        .route("/studio/videos", get(list_studio_videos))
        .route("/videos", get(list_public_videos));

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .nest("/api", api_routes);

    if let Some(handle) = metrics_handle {
        router = router.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    router
        // route_layer so MatchedPath is available for the route label
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
