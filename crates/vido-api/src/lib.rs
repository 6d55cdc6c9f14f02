//! Vido HTTP API.
//!
//! Exposes the webhook endpoint, the workflow trigger, and cursor-
//! paginated collection listings.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod signature;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use signature::{WebhookVerifier, SIGNATURE_HEADER};
pub use state::AppState;
