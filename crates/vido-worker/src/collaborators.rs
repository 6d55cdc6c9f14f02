//! Collaborator seams for workflow pipelines.
//!
//! Pipelines only ever talk to these narrow interfaces: the row store,
//! the durable object store and the generation provider. Production wires
//! them to the real clients; tests substitute fakes and count calls.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use vido_ai::{ImageGenClient, Seeder, SummarizerClient, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use vido_firestore::VideoRepository;
use vido_models::{JobKind, RunStatus, VideoAsset, VideoId};
use vido_storage::{R2Client, StoredObject};

use crate::error::{WorkerError, WorkerResult};

/// Video row store, scoped the way pipelines need it.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Fetch a row scoped to `(video_id, owner_id)`.
    async fn get_owned(
        &self,
        video_id: &VideoId,
        owner_id: &str,
    ) -> WorkerResult<Option<VideoAsset>>;

    /// Null the stored thumbnail reference.
    async fn clear_thumbnail(&self, video_id: &VideoId) -> WorkerResult<()>;

    /// Point the row at a stored thumbnail.
    async fn set_thumbnail(&self, video_id: &VideoId, url: &str, key: &str) -> WorkerResult<()>;

    /// Replace the title.
    async fn set_title(&self, video_id: &VideoId, title: &str) -> WorkerResult<()>;

    /// Replace the description.
    async fn set_description(&self, video_id: &VideoId, description: &str) -> WorkerResult<()>;

    /// Record the run outcome on the row.
    async fn set_job_outcome(
        &self,
        video_id: &VideoId,
        kind: JobKind,
        status: RunStatus,
        error: Option<&str>,
    ) -> WorkerResult<()>;
}

/// Durable object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Delete a stored object by key.
    async fn delete(&self, key: &str) -> WorkerResult<()>;

    /// Persist thumbnail bytes, returning the permanent URL and key.
    async fn store_thumbnail(
        &self,
        owner_id: &str,
        video_id: &VideoId,
        data: Vec<u8>,
    ) -> WorkerResult<StoredObject>;
}

/// Generation provider.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Build a temporary source URL for a thumbnail prompt.
    fn thumbnail_url(&self, prompt: &str) -> WorkerResult<String>;

    /// Fetch rendered bytes from a temporary source URL.
    async fn fetch_bytes(&self, url: &str) -> WorkerResult<Vec<u8>>;

    /// Summarize text under a system prompt.
    async fn summarize(&self, system_prompt: &str, input: &str) -> WorkerResult<String>;

    /// Fetch the subtitle track text for a playback ID.
    async fn fetch_transcript(&self, playback_id: &str) -> WorkerResult<String>;
}

/// Everything a pipeline needs, bundled.
#[derive(Clone)]
pub struct JobContext {
    pub videos: Arc<dyn VideoStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub generator: Arc<dyn Generator>,
}

// =============================================================================
// Production adapters
// =============================================================================

#[async_trait]
impl VideoStore for VideoRepository {
    async fn get_owned(
        &self,
        video_id: &VideoId,
        owner_id: &str,
    ) -> WorkerResult<Option<VideoAsset>> {
        Ok(VideoRepository::get_owned(self, video_id, owner_id).await?)
    }

    async fn clear_thumbnail(&self, video_id: &VideoId) -> WorkerResult<()> {
        Ok(VideoRepository::clear_thumbnail(self, video_id).await?)
    }

    async fn set_thumbnail(&self, video_id: &VideoId, url: &str, key: &str) -> WorkerResult<()> {
        Ok(VideoRepository::set_thumbnail(self, video_id, url, key).await?)
    }

    async fn set_title(&self, video_id: &VideoId, title: &str) -> WorkerResult<()> {
        Ok(VideoRepository::set_title(self, video_id, title).await?)
    }

    async fn set_description(&self, video_id: &VideoId, description: &str) -> WorkerResult<()> {
        Ok(VideoRepository::set_description(self, video_id, description).await?)
    }

    async fn set_job_outcome(
        &self,
        video_id: &VideoId,
        kind: JobKind,
        status: RunStatus,
        error: Option<&str>,
    ) -> WorkerResult<()> {
        Ok(VideoRepository::set_job_outcome(self, video_id, kind, status, error).await?)
    }
}

#[async_trait]
impl ObjectStore for R2Client {
    async fn delete(&self, key: &str) -> WorkerResult<()> {
        Ok(self.delete_object(key).await?)
    }

    async fn store_thumbnail(
        &self,
        owner_id: &str,
        video_id: &VideoId,
        data: Vec<u8>,
    ) -> WorkerResult<StoredObject> {
        Ok(R2Client::store_thumbnail(self, owner_id, video_id, data).await?)
    }
}

/// Production generator: image provider + summarizer + provider subtitle
/// endpoint, with the seed source injected.
pub struct ProviderGenerator {
    pub image: ImageGenClient,
    pub summarizer: SummarizerClient,
    pub seeder: Arc<dyn Seeder>,
    pub http: Client,
    pub stream_base_url: String,
}

impl ProviderGenerator {
    fn transcript_url(&self, playback_id: &str) -> String {
        // Provider serves the default text track as plain text
        format!(
            "{}/{}/text/en.txt",
            self.stream_base_url.trim_end_matches('/'),
            playback_id
        )
    }
}

#[async_trait]
impl Generator for ProviderGenerator {
    fn thumbnail_url(&self, prompt: &str) -> WorkerResult<String> {
        Ok(self
            .image
            .generation_url(prompt, THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, self.seeder.as_ref())?)
    }

    async fn fetch_bytes(&self, url: &str) -> WorkerResult<Vec<u8>> {
        Ok(self.image.fetch_bytes(url).await?)
    }

    async fn summarize(&self, system_prompt: &str, input: &str) -> WorkerResult<String> {
        Ok(self.summarizer.summarize(system_prompt, input).await?)
    }

    async fn fetch_transcript(&self, playback_id: &str) -> WorkerResult<String> {
        let url = self.transcript_url(playback_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkerError::Transcript(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(WorkerError::Transcript(format!(
                "HTTP {} for {}",
                resp.status(),
                url
            )));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| WorkerError::Transcript(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(WorkerError::Transcript(format!("empty track at {}", url)));
        }
        Ok(text)
    }
}
