//! Application state.

use std::sync::Arc;

use vido_firestore::{FirestoreClient, VideoRepository};
use vido_queue::{RedisRunStore, RunStore, WorkflowQueue};

use crate::config::ApiConfig;
use crate::middleware::RateLimiterCache;
use crate::signature::WebhookVerifier;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub videos: VideoRepository,
    pub queue: Arc<WorkflowQueue>,
    pub run_store: Arc<dyn RunStore>,
    pub verifier: WebhookVerifier,
    pub rate_limiter: RateLimiterCache,
}

impl AppState {
    /// Create new application state from configuration.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let firestore = FirestoreClient::from_env()?;
        let queue = WorkflowQueue::from_env()?;
        let run_store = RedisRunStore::from_env()?;
        let verifier = WebhookVerifier::new(
            config.webhook_secret.clone().into_bytes(),
            config.webhook_tolerance,
        );
        let rate_limiter = RateLimiterCache::new(config.rate_limit_rps);

        Ok(Self {
            videos: VideoRepository::new(firestore),
            queue: Arc::new(queue),
            run_store: Arc::new(run_store),
            verifier,
            rate_limiter,
            config,
        })
    }
}
