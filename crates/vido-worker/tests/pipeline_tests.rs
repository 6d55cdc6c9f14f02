//! Pipeline contract tests: resumption, non-rollback, guard fencing.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use vido_models::{JobKind, RunStatus, VideoAsset, VideoId, WorkflowJob};
use vido_queue::{MemoryRunStore, RunStore};
use vido_storage::StoredObject;
use vido_worker::{
    processor, Generator, JobContext, ObjectStore, VideoStore, WorkerConfig, WorkerError,
    WorkerResult,
};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct FakeVideos {
    row: Mutex<Option<VideoAsset>>,
    get_calls: AtomicU32,
    outcomes: Mutex<Vec<(JobKind, RunStatus, Option<String>)>>,
}

impl FakeVideos {
    fn with_row(row: VideoAsset) -> Self {
        Self {
            row: Mutex::new(Some(row)),
            ..Default::default()
        }
    }

    async fn row(&self) -> VideoAsset {
        self.row.lock().await.clone().expect("row exists")
    }
}

#[async_trait]
impl VideoStore for FakeVideos {
    async fn get_owned(
        &self,
        _video_id: &VideoId,
        owner_id: &str,
    ) -> WorkerResult<Option<VideoAsset>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .row
            .lock()
            .await
            .clone()
            .filter(|v| v.owner_id == owner_id))
    }

    async fn clear_thumbnail(&self, _video_id: &VideoId) -> WorkerResult<()> {
        if let Some(row) = self.row.lock().await.as_mut() {
            row.thumbnail_url = None;
            row.thumbnail_key = None;
        }
        Ok(())
    }

    async fn set_thumbnail(&self, _video_id: &VideoId, url: &str, key: &str) -> WorkerResult<()> {
        if let Some(row) = self.row.lock().await.as_mut() {
            row.thumbnail_url = Some(url.to_string());
            row.thumbnail_key = Some(key.to_string());
        }
        Ok(())
    }

    async fn set_title(&self, _video_id: &VideoId, title: &str) -> WorkerResult<()> {
        if let Some(row) = self.row.lock().await.as_mut() {
            row.title = title.to_string();
        }
        Ok(())
    }

    async fn set_description(&self, _video_id: &VideoId, description: &str) -> WorkerResult<()> {
        if let Some(row) = self.row.lock().await.as_mut() {
            row.description = Some(description.to_string());
        }
        Ok(())
    }

    async fn set_job_outcome(
        &self,
        _video_id: &VideoId,
        kind: JobKind,
        status: RunStatus,
        error: Option<&str>,
    ) -> WorkerResult<()> {
        if let Some(row) = self.row.lock().await.as_mut() {
            row.last_job_kind = Some(kind);
            row.last_job_status = Some(status);
            row.last_job_error = error.map(|e| e.to_string());
        }
        self.outcomes
            .lock()
            .await
            .push((kind, status, error.map(|e| e.to_string())));
        Ok(())
    }
}

#[derive(Default)]
struct FakeObjects {
    deleted: Mutex<Vec<String>>,
    stored: Mutex<Vec<String>>,
    fail_store: AtomicBool,
}

#[async_trait]
impl ObjectStore for FakeObjects {
    async fn delete(&self, key: &str) -> WorkerResult<()> {
        self.deleted.lock().await.push(key.to_string());
        Ok(())
    }

    async fn store_thumbnail(
        &self,
        owner_id: &str,
        video_id: &VideoId,
        _data: Vec<u8>,
    ) -> WorkerResult<StoredObject> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(WorkerError::run_failed("object store unavailable"));
        }
        let key = format!("{}/{}/thumbnails/1.jpg", owner_id, video_id);
        self.stored.lock().await.push(key.clone());
        Ok(StoredObject {
            url: format!("https://cdn.vido.example/{}", key),
            key,
        })
    }
}

#[derive(Default)]
struct FakeGenerator {
    url_calls: AtomicU32,
    fetch_calls: AtomicU32,
    summarize_calls: AtomicU32,
    transcript_calls: AtomicU32,
    fail_fetch: AtomicBool,
}

#[async_trait]
impl Generator for FakeGenerator {
    fn thumbnail_url(&self, prompt: &str) -> WorkerResult<String> {
        self.url_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://gen.example/prompt/{}", prompt.len()))
    }

    async fn fetch_bytes(&self, _url: &str) -> WorkerResult<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(WorkerError::run_failed("temporary URL fetch failed"));
        }
        Ok(vec![0xff, 0xd8, 0xff])
    }

    async fn summarize(&self, system_prompt: &str, _input: &str) -> WorkerResult<String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        if system_prompt.contains("title") {
            Ok("Generated Title".to_string())
        } else {
            Ok("Generated description.".to_string())
        }
    }

    async fn fetch_transcript(&self, _playback_id: &str) -> WorkerResult<String> {
        self.transcript_calls.fetch_add(1, Ordering::SeqCst);
        Ok("hello world transcript".to_string())
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    videos: Arc<FakeVideos>,
    objects: Arc<FakeObjects>,
    generator: Arc<FakeGenerator>,
    ctx: JobContext,
    store: Arc<MemoryRunStore>,
    config: WorkerConfig,
}

fn ready_row() -> VideoAsset {
    let mut row = VideoAsset::new_upload("user_1", "up_1");
    row.id = VideoId::from("vid_1");
    row.playback_id = Some("pb_1".into());
    row
}

fn harness(row: VideoAsset) -> Harness {
    let videos = Arc::new(FakeVideos::with_row(row));
    let objects = Arc::new(FakeObjects::default());
    let generator = Arc::new(FakeGenerator::default());
    let ctx = JobContext {
        videos: Arc::clone(&videos) as Arc<dyn VideoStore>,
        objects: Arc::clone(&objects) as Arc<dyn ObjectStore>,
        generator: Arc::clone(&generator) as Arc<dyn Generator>,
    };
    Harness {
        videos,
        objects,
        generator,
        ctx,
        store: Arc::new(MemoryRunStore::new()),
        config: WorkerConfig {
            step_timeout: Duration::from_millis(500),
            ..WorkerConfig::default()
        },
    }
}

fn job(kind: JobKind) -> WorkflowJob {
    WorkflowJob::new("user_1", VideoId::from("vid_1"), kind).with_prompt("a red fox")
}

async fn run_once(h: &Harness, job: &WorkflowJob) -> WorkerResult<()> {
    processor::execute_run(
        &h.ctx,
        Arc::clone(&h.store) as Arc<dyn RunStore>,
        &h.config,
        job,
    )
    .await
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_thumbnail_happy_path_updates_row_and_outcome() {
    let h = harness(ready_row());
    let job = job(JobKind::Thumbnail);

    run_once(&h, &job).await.unwrap();

    let row = h.videos.row().await;
    assert!(row.thumbnail_url.as_deref().unwrap().contains("thumbnails"));
    assert!(row.thumbnail_key.is_some());
    assert_eq!(row.last_job_status, Some(RunStatus::Completed));
    assert_eq!(row.last_job_error, None);
    assert_eq!(h.generator.url_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_resumption_skips_captured_steps_and_their_external_calls() {
    let h = harness(ready_row());
    let job = job(JobKind::Thumbnail);

    // First delivery: the upload step fails after generate succeeded.
    h.objects.fail_store.store(true, Ordering::SeqCst);
    assert!(run_once(&h, &job).await.is_err());
    assert_eq!(h.videos.get_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.url_calls.load(Ordering::SeqCst), 1);

    let captured = h.store.captured_steps(&job.run_id).await;
    assert!(captured.contains(&"get-video".to_string()));
    assert!(captured.contains(&"generate-thumbnail".to_string()));
    assert!(captured.contains(&"cleanup-thumbnail".to_string()));
    assert!(!captured.contains(&"upload-thumbnail".to_string()));

    // Redelivery of the same run: steps 1-3 replay from capture, so the
    // row fetch and the generator are not called again.
    h.objects.fail_store.store(false, Ordering::SeqCst);
    run_once(&h, &job).await.unwrap();

    assert_eq!(h.videos.get_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.url_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.videos.row().await.last_job_status, Some(RunStatus::Completed));
}

#[tokio::test]
async fn test_cleanup_before_failed_upload_leaves_no_thumbnail_reference() {
    // Scenario: the row already has a stored thumbnail, cleanup succeeds,
    // then the persist step fails. The old object is gone and the row
    // reference stays null; that window is the accepted tradeoff of
    // cleaning up before the replacement exists.
    let mut row = ready_row();
    row.thumbnail_url = Some("https://cdn.vido.example/user_1/vid_1/thumbnails/0.jpg".into());
    row.thumbnail_key = Some("user_1/vid_1/thumbnails/0.jpg".into());

    let h = harness(row);
    h.generator.fail_fetch.store(true, Ordering::SeqCst);
    let job = job(JobKind::Thumbnail);

    assert!(run_once(&h, &job).await.is_err());

    let row = h.videos.row().await;
    assert_eq!(row.thumbnail_url, None);
    assert_eq!(row.thumbnail_key, None);
    assert_eq!(
        h.objects.deleted.lock().await.as_slice(),
        ["user_1/vid_1/thumbnails/0.jpg"]
    );
    assert!(h.objects.stored.lock().await.is_empty());
}

#[tokio::test]
async fn test_missing_or_foreign_video_fails_the_run() {
    let mut row = ready_row();
    row.owner_id = "someone_else".into();
    let h = harness(row);

    let err = run_once(&h, &job(JobKind::Thumbnail)).await.unwrap_err();
    assert!(matches!(err, WorkerError::NotFound(_)));
    assert!(!err.is_retryable());
    // No generation happened
    assert_eq!(h.generator.url_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_run_for_same_kind_is_fenced() {
    let h = harness(ready_row());
    let first = job(JobKind::Thumbnail);
    let second = job(JobKind::Thumbnail);

    // First run holds the guard (simulates an in-flight run).
    assert!(h
        .store
        .acquire_guard(
            &first.video_id,
            JobKind::Thumbnail,
            &first.run_id,
            Duration::from_secs(60)
        )
        .await
        .unwrap());

    let err = run_once(&h, &second).await.unwrap_err();
    assert!(matches!(err, WorkerError::GuardHeld));

    // A different job kind proceeds independently.
    run_once(&h, &job(JobKind::Title)).await.unwrap();
}

#[tokio::test]
async fn test_title_pipeline_persists_summary() {
    let h = harness(ready_row());
    run_once(&h, &job(JobKind::Title)).await.unwrap();

    let row = h.videos.row().await;
    assert_eq!(row.title, "Generated Title");
    assert_eq!(h.generator.transcript_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.summarize_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_description_pipeline_persists_summary() {
    let h = harness(ready_row());
    run_once(&h, &job(JobKind::Description)).await.unwrap();

    let row = h.videos.row().await;
    assert_eq!(row.description.as_deref(), Some("Generated description."));
}

#[tokio::test]
async fn test_summary_requires_playback_id() {
    let mut row = ready_row();
    row.playback_id = None;
    let h = harness(row);

    let err = run_once(&h, &job(JobKind::Title)).await.unwrap_err();
    assert!(matches!(err, WorkerError::RunFailed(_)));
    assert_eq!(h.generator.summarize_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_completed_run_releases_guard_and_state() {
    let h = harness(ready_row());
    let first = job(JobKind::Thumbnail);
    run_once(&h, &first).await.unwrap();

    // Captured state is gone
    assert!(h.store.captured_steps(&first.run_id).await.is_empty());

    // And a new run for the same (video, kind) can start immediately.
    let second = job(JobKind::Thumbnail);
    run_once(&h, &second).await.unwrap();
}

#[tokio::test]
async fn test_finalize_failure_records_outcome_and_frees_guard() {
    let h = harness(ready_row());
    let failing = job(JobKind::Thumbnail);

    h.generator.fail_fetch.store(true, Ordering::SeqCst);
    assert!(run_once(&h, &failing).await.is_err());

    processor::finalize_failure(
        &h.ctx,
        Arc::clone(&h.store) as Arc<dyn RunStore>,
        &failing,
        "temporary URL fetch failed",
    )
    .await;

    let row = h.videos.row().await;
    assert_eq!(row.last_job_status, Some(RunStatus::Failed));
    assert_eq!(
        row.last_job_error.as_deref(),
        Some("temporary URL fetch failed")
    );

    // Guard is free for a fresh trigger.
    h.generator.fail_fetch.store(false, Ordering::SeqCst);
    run_once(&h, &job(JobKind::Thumbnail)).await.unwrap();
}
