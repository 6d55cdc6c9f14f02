//! Prompt-to-image generation client.
//!
//! The provider renders an image for a URL-encoded prompt; "calling" it is
//! building the parameterized URL, which the provider serves as a
//! temporary source. The bytes are only made durable once the workflow
//! copies them into our own object store.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{AiError, AiResult};
use crate::seed::Seeder;

/// Fixed thumbnail output dimensions.
pub const THUMBNAIL_WIDTH: u32 = 1792;
pub const THUMBNAIL_HEIGHT: u32 = 1024;

/// Generation model identifier.
const MODEL: &str = "flux";

/// Image generation client configuration.
#[derive(Debug, Clone)]
pub struct ImageGenConfig {
    /// Provider base URL
    pub base_url: String,
    /// Fetch timeout for the rendered image
    pub timeout: Duration,
}

impl Default for ImageGenConfig {
    fn default() -> Self {
        Self {
            base_url: "https://image.pollinations.ai".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ImageGenConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("IMAGE_GEN_BASE_URL")
                .unwrap_or_else(|_| "https://image.pollinations.ai".to_string()),
            timeout: Duration::from_secs(
                std::env::var("IMAGE_GEN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

/// Image generation client.
#[derive(Clone)]
pub struct ImageGenClient {
    http: Client,
    base_url: String,
}

impl ImageGenClient {
    /// Create a new client.
    pub fn new(config: ImageGenConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vido-ai/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the temporary source URL for a prompt. The seed comes from an
    /// injected [`Seeder`] so tests get deterministic URLs.
    pub fn generation_url(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        seeder: &dyn Seeder,
    ) -> AiResult<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AiError::empty("generation prompt"));
        }

        let seed = seeder.next_seed();
        let url = format!(
            "{}/prompt/{}?width={}&height={}&seed={}&model={}&nologo=true&enhance=false",
            self.base_url,
            urlencoding::encode(prompt),
            width,
            height,
            seed,
            MODEL,
        );
        debug!(seed, "Built generation URL");
        Ok(url)
    }

    /// Fetch the rendered bytes from a temporary source URL. An empty body
    /// counts as a provider failure.
    pub async fn fetch_bytes(&self, url: &str) -> AiResult<Vec<u8>> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Api(status.as_u16(), body));
        }

        let bytes = resp.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(AiError::empty(format!("no bytes at {}", url)));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::FixedSeeder;

    fn client() -> ImageGenClient {
        ImageGenClient::new(ImageGenConfig::default()).unwrap()
    }

    #[test]
    fn test_generation_url_is_deterministic_with_fixed_seed() {
        let seeder = FixedSeeder(42);
        let url = client()
            .generation_url("a red fox, cinematic", THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, &seeder)
            .unwrap();
        assert_eq!(
            url,
            "https://image.pollinations.ai/prompt/a%20red%20fox%2C%20cinematic\
             ?width=1792&height=1024&seed=42&model=flux&nologo=true&enhance=false"
        );
    }

    #[test]
    fn test_empty_prompt_is_rejected() {
        let seeder = FixedSeeder(1);
        assert!(client()
            .generation_url("   ", 100, 100, &seeder)
            .is_err());
    }
}
