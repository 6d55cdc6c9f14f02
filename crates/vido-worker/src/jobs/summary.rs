//! Title and description pipelines.
//!
//! Same contract as the thumbnail pipeline with fewer steps: fetch the
//! row, fetch the subtitle track, summarize, persist.

use vido_models::{VideoAsset, WorkflowJob};

use crate::collaborators::JobContext;
use crate::error::{WorkerError, WorkerResult};
use crate::workflow::RunContext;

const TITLE_SYSTEM_PROMPT: &str = "\
Your task is to generate an SEO-focused title for a video based on its transcript.
- Be concise but descriptive, capturing the main point of the video.
- Highlight the most compelling or unique aspect of the content.
- Avoid jargon unless it improves searchability.
- Use 3-8 words, never more than 100 characters.
- Return ONLY the title as plain text, no quotes or markup.";

const DESCRIPTION_SYSTEM_PROMPT: &str = "\
Your task is to summarize the transcript of a video.
- Be brief: 3-5 sentences, never more than 200 words.
- Capture key points and main takeaways.
- Write for someone deciding whether to watch.
- Return ONLY the summary as plain text, no quotes or markup.";

pub async fn run_title(ctx: &JobContext, run: &RunContext, job: &WorkflowJob) -> WorkerResult<()> {
    let transcript = fetch_inputs(ctx, run, job).await?;

    let title: String = run
        .step("generate-title", || async {
            ctx.generator
                .summarize(TITLE_SYSTEM_PROMPT, &transcript)
                .await
        })
        .await?;

    run.step("update-video", || async {
        ctx.videos.set_title(&job.video_id, &title).await
    })
    .await
}

pub async fn run_description(
    ctx: &JobContext,
    run: &RunContext,
    job: &WorkflowJob,
) -> WorkerResult<()> {
    let transcript = fetch_inputs(ctx, run, job).await?;

    let description: String = run
        .step("generate-description", || async {
            ctx.generator
                .summarize(DESCRIPTION_SYSTEM_PROMPT, &transcript)
                .await
        })
        .await?;

    run.step("update-video", || async {
        ctx.videos
            .set_description(&job.video_id, &description)
            .await
    })
    .await
}

/// Shared `get-video` + `get-transcript` prefix.
async fn fetch_inputs(
    ctx: &JobContext,
    run: &RunContext,
    job: &WorkflowJob,
) -> WorkerResult<String> {
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

    run.step("get-transcript", || async {
        let playback_id = video.playback_id.as_deref().ok_or_else(|| {
            WorkerError::run_failed(format!("video {} has no playback id yet", job.video_id))
        })?;
        ctx.generator.fetch_transcript(playback_id).await
    })
    .await
}
