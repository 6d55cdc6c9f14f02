//! Thumbnail generation pipeline.
//!
//! Ordered steps: `get-video`, `generate-thumbnail`, `cleanup-thumbnail`,
//! `upload-thumbnail`, `update-video`.
//!
//! The cleanup step deletes the previous stored thumbnail and nulls the
//! row reference BEFORE the replacement is fetched. That ordering means a
//! failed upload can leave the video with no stored thumbnail at all; the
//! alternative (two live copies after an upload that succeeded but whose
//! cleanup then failed) was judged worse. The pipeline does not roll back.

use tracing::info;

use vido_models::{VideoAsset, WorkflowJob};
use vido_storage::StoredObject;

use crate::collaborators::JobContext;
use crate::error::{WorkerError, WorkerResult};
use crate::workflow::RunContext;

/// Prompt used when the trigger did not supply one.
const DEFAULT_PROMPT: &str =
    "A compelling thumbnail for this video, vivid colors, high contrast, no text";

pub async fn run(ctx: &JobContext, run: &RunContext, job: &WorkflowJob) -> WorkerResult<()> {
    let video: VideoAsset = run
        .step("get-video", || async {
            ctx.videos
                .get_owned(&job.video_id, &job.owner_id)
                .await?
                .ok_or_else(|| {
                    WorkerError::not_found(format!(
                        "video {} for owner {}",
                        job.video_id, job.owner_id
                    ))
                })
        })
        .await?;

    let prompt = job.prompt.clone().unwrap_or_else(|| DEFAULT_PROMPT.to_string());

    let temp_url: String = run
        .step("generate-thumbnail", || async {
            ctx.generator.thumbnail_url(&prompt)
        })
        .await?;

    if temp_url.is_empty() {
        return Err(WorkerError::run_failed("generator returned no source URL"));
    }

    run.step("cleanup-thumbnail", || async {
        if let Some(key) = &video.thumbnail_key {
            ctx.objects.delete(key).await?;
            ctx.videos.clear_thumbnail(&job.video_id).await?;
            info!(video_id = %job.video_id, key = %key, "Deleted previous thumbnail");
        }
        Ok(())
    })
    .await?;

    let stored: StoredObject = run
        .step("upload-thumbnail", || async {
            let bytes = ctx.generator.fetch_bytes(&temp_url).await?;
            ctx.objects
                .store_thumbnail(&job.owner_id, &job.video_id, bytes)
                .await
        })
        .await?;

    run.step("update-video", || async {
        ctx.videos
            .set_thumbnail(&job.video_id, &stored.url, &stored.key)
            .await
    })
    .await?;

    Ok(())
}
