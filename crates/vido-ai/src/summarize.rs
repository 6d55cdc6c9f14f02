//! LLM summarizer client for titles and descriptions.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AiError, AiResult};

/// Summarizer client configuration.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Provider base URL
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl SummarizerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Ok(Self {
            base_url: std::env::var("SUMMARIZER_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            api_key: std::env::var("SUMMARIZER_API_KEY")
                .map_err(|_| AiError::config_error("SUMMARIZER_API_KEY not set"))?,
            model: std::env::var("SUMMARIZER_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            timeout: Duration::from_secs(
                std::env::var("SUMMARIZER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

// Request/response wire types.

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// Summarizer client.
#[derive(Clone)]
pub struct SummarizerClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl SummarizerClient {
    /// Create a new client.
    pub fn new(config: SummarizerConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vido-ai/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model: config.model,
        })
    }

    /// Summarize `input` under `system_prompt`, returning trimmed text.
    /// An empty completion is a provider failure.
    pub async fn summarize(&self, system_prompt: &str, input: &str) -> AiResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: input.to_string(),
                }],
            }],
            system_instruction: Content {
                parts: vec![Part {
                    text: system_prompt.to_string(),
                }],
            },
        };

        let resp = self.http.post(&url).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Api(status.as_u16(), body));
        }

        let parsed: GenerateResponse = resp.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AiError::empty("summarizer completion"));
        }

        debug!(chars = text.len(), "Summarizer returned text");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> SummarizerClient {
        SummarizerClient::new(SummarizerConfig {
            base_url: server.uri(),
            api_key: "test-key".into(),
            model: "test-model".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_summarize_returns_first_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:generateContent"))
            .and(body_partial_json(json!({
                "contents": [{"parts": [{"text": "the transcript"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    {"content": {"parts": [{"text": "  A Good Title \n"}]}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let title = client.summarize("write a title", "the transcript").await.unwrap();
        assert_eq!(title, "A Good Title");
    }

    #[tokio::test]
    async fn test_empty_completion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.summarize("write a title", "text").await.unwrap_err();
        assert!(matches!(err, AiError::Empty(_)));
    }

    #[tokio::test]
    async fn test_provider_error_surfaces_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:generateContent"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.summarize("p", "t").await.unwrap_err();
        assert!(matches!(err, AiError::Api(429, _)));
        assert!(err.is_retryable());
    }
}
