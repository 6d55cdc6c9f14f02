//! API configuration.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second per IP
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Shared secret the provider signs webhook bodies with
    pub webhook_secret: String,
    /// Signature timestamp tolerance
    pub webhook_tolerance: Duration,
    /// Base URL of the provider image service (thumbnail/preview templates)
    pub media_image_base_url: String,
    /// HS256 secret for bearer tokens issued by the identity provider
    pub auth_secret: String,
    /// In-flight guard lease duration for triggered workflows
    pub guard_ttl: Duration,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 1024 * 1024,
            webhook_secret: String::new(),
            webhook_tolerance: Duration::from_secs(300),
            media_image_base_url: "https://image.mux.com".to_string(),
            auth_secret: String::new(),
            guard_ttl: Duration::from_secs(900),
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024),
            webhook_secret: std::env::var("WEBHOOK_SIGNING_SECRET").unwrap_or_default(),
            webhook_tolerance: Duration::from_secs(
                std::env::var("WEBHOOK_TOLERANCE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            media_image_base_url: std::env::var("MEDIA_IMAGE_BASE_URL")
                .unwrap_or_else(|_| "https://image.mux.com".to_string()),
            auth_secret: std::env::var("AUTH_JWT_SECRET").unwrap_or_default(),
            guard_ttl: Duration::from_secs(
                std::env::var("WORKFLOW_GUARD_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
