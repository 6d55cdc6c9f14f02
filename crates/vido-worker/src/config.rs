//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent runs
    pub max_concurrent_runs: usize,
    /// Per-step timeout; a timed-out step fails the run
    pub step_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often to scan for orphaned pending runs
    pub claim_interval: Duration,
    /// Minimum idle time before a pending run can be claimed (crash recovery)
    pub claim_min_idle: Duration,
    /// In-flight guard lease duration
    pub guard_ttl: Duration,
    /// Base URL of the provider's subtitle/stream service
    pub stream_base_url: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
            step_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            guard_ttl: Duration::from_secs(900),
            stream_base_url: "https://stream.mux.com".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_runs: std::env::var("WORKER_MAX_RUNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            step_timeout: Duration::from_secs(
                std::env::var("WORKER_STEP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            claim_interval: Duration::from_secs(
                std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            claim_min_idle: Duration::from_secs(
                std::env::var("WORKER_CLAIM_MIN_IDLE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            guard_ttl: Duration::from_secs(
                std::env::var("WORKFLOW_GUARD_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            stream_base_url: std::env::var("MEDIA_STREAM_BASE_URL")
                .unwrap_or_else(|_| "https://stream.mux.com".to_string()),
        }
    }
}
