//! Firestore REST API client.
//!
//! Thin typed wrapper over the documents endpoints with token caching,
//! retry and per-request metrics. Points at the emulator when
//! `FIRESTORE_EMULATOR_HOST` is set, which is also how the wiremock tests
//! drive it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::auth::Authenticator;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::types::{Document, RunQueryRequest, RunQueryResult, StructuredQuery, Value};

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
    /// Emulator host override (`host:port`), no auth when set
    pub emulator_host: Option<String>,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .map_err(|_| FirestoreError::auth_error("GCP_PROJECT_ID must be set"))?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error("GCP_PROJECT_ID cannot be empty"));
        }

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::from_env(),
            emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST").ok(),
        })
    }

    /// Emulator config for tests and local development.
    pub fn emulator(host: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            },
            emulator_host: Some(host.into()),
        }
    }
}

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    base_url: String,
    retry: RetryConfig,
    auth: Arc<Authenticator>,
}

impl FirestoreClient {
    /// Create a new client.
    pub fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let auth = match &config.emulator_host {
            Some(_) => Authenticator::emulator(),
            None => Authenticator::from_env()?,
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vido-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = match &config.emulator_host {
            Some(host) => format!(
                "http://{}/v1/projects/{}/databases/{}/documents",
                host, config.project_id, config.database_id
            ),
            None => format!(
                "https://firestore.googleapis.com/v1/projects/{}/databases/{}/documents",
                config.project_id, config.database_id
            ),
        };

        Ok(Self {
            http,
            base_url,
            retry: config.retry,
            auth: Arc::new(auth),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?)
    }

    async fn bearer(&self) -> FirestoreResult<String> {
        self.auth.token().await
    }

    /// Fetch one document; `Ok(None)` when it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = format!("{}/{}/{}", self.base_url, collection, doc_id);

        with_retry(&self.retry, "get_document", || async {
            let token = self.bearer().await?;
            let resp = self.http.get(&url).bearer_auth(&token).send().await?;
            let status = resp.status();
            record_request("get_document", status.as_u16());

            match status {
                StatusCode::OK => Ok(Some(resp.json::<Document>().await?)),
                StatusCode::NOT_FOUND => Ok(None),
                _ => Err(self.error_from(resp).await),
            }
        })
        .await
    }

    /// Create a document with a caller-chosen ID. Fails with
    /// [`FirestoreError::AlreadyExists`] when the ID is taken.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url, collection, doc_id
        );
        let body = Document::new(fields);

        with_retry(&self.retry, "create_document", || async {
            let token = self.bearer().await?;
            let resp = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;
            let status = resp.status();
            record_request("create_document", status.as_u16());

            if status.is_success() {
                Ok(resp.json::<Document>().await?)
            } else {
                Err(self.error_from(resp).await)
            }
        })
        .await
    }

    /// Patch the masked fields of an existing document. The existence
    /// precondition turns a patch of a missing row into
    /// [`FirestoreError::NotFound`] instead of an upsert.
    pub async fn patch_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        mask: &[&str],
    ) -> FirestoreResult<()> {
        let mask_params: Vec<String> = mask
            .iter()
            .map(|f| format!("updateMask.fieldPaths={}", f))
            .collect();
        let url = format!(
            "{}/{}/{}?currentDocument.exists=true&{}",
            self.base_url,
            collection,
            doc_id,
            mask_params.join("&")
        );
        let body = Document::new(fields);

        with_retry(&self.retry, "patch_document", || async {
            let token = self.bearer().await?;
            let resp = self
                .http
                .patch(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;
            let status = resp.status();
            record_request("patch_document", status.as_u16());

            if status.is_success() {
                Ok(())
            } else {
                Err(self.error_from(resp).await)
            }
        })
        .await
    }

    /// Delete a document. Deleting a missing document is a no-op upstream,
    /// mirrored here.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        let url = format!("{}/{}/{}", self.base_url, collection, doc_id);

        with_retry(&self.retry, "delete_document", || async {
            let token = self.bearer().await?;
            let resp = self.http.delete(&url).bearer_auth(&token).send().await?;
            let status = resp.status();
            record_request("delete_document", status.as_u16());

            if status.is_success() || status == StatusCode::NOT_FOUND {
                Ok(())
            } else {
                Err(self.error_from(resp).await)
            }
        })
        .await
    }

    /// Run a structured query and collect the returned documents.
    pub async fn run_query(&self, query: StructuredQuery) -> FirestoreResult<Vec<Document>> {
        let url = format!("{}:runQuery", self.base_url);
        let body = RunQueryRequest {
            structured_query: query,
        };

        with_retry(&self.retry, "run_query", || async {
            let token = self.bearer().await?;
            let resp = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;
            let status = resp.status();
            record_request("run_query", status.as_u16());

            if !status.is_success() {
                return Err(self.error_from(resp).await);
            }

            let results: Vec<RunQueryResult> = resp.json().await?;
            let docs: Vec<Document> = results.into_iter().filter_map(|r| r.document).collect();
            debug!(count = docs.len(), "Query returned documents");
            Ok(docs)
        })
        .await
    }

    async fn error_from(&self, resp: reqwest::Response) -> FirestoreError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        if body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"") {
            self.auth.invalidate().await;
        }
        FirestoreError::from_http_status(status, &body)
    }
}
