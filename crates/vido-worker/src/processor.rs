//! Run execution: guard, outcome bookkeeping, pipeline dispatch.

use std::sync::Arc;

use tracing::{info, warn};

use vido_models::{RunStatus, WorkflowJob};
use vido_queue::RunStore;

use crate::collaborators::JobContext;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::jobs;
use crate::workflow::RunContext;

/// Execute (or resume) one workflow run to completion.
///
/// On success the captured state and guard are released here. On failure
/// the state is kept so a redelivery resumes from the first unfinished
/// step; [`finalize_failure`] tears it down once retries are exhausted.
pub async fn execute_run(
    ctx: &JobContext,
    run_store: Arc<dyn RunStore>,
    config: &WorkerConfig,
    job: &WorkflowJob,
) -> WorkerResult<()> {
    let acquired = run_store
        .acquire_guard(&job.video_id, job.kind, &job.run_id, config.guard_ttl)
        .await?;
    if !acquired {
        warn!(
            run_id = %job.run_id,
            video_id = %job.video_id,
            kind = %job.kind,
            "Another run holds the in-flight guard; dropping this one"
        );
        return Err(WorkerError::GuardHeld);
    }

    ctx.videos
        .set_job_outcome(&job.video_id, job.kind, RunStatus::Running, None)
        .await?;

    let run = RunContext::new(job.run_id.clone(), Arc::clone(&run_store), config.step_timeout);
    jobs::execute(ctx, &run, job).await?;

    ctx.videos
        .set_job_outcome(&job.video_id, job.kind, RunStatus::Completed, None)
        .await?;
    run.clear().await?;
    run_store
        .release_guard(&job.video_id, job.kind, &job.run_id)
        .await?;

    info!(run_id = %job.run_id, kind = %job.kind, "Workflow run completed");
    Ok(())
}

/// Terminal failure: record the outcome on the row and tear down run
/// state. Side effects of completed steps stay committed.
pub async fn finalize_failure(
    ctx: &JobContext,
    run_store: Arc<dyn RunStore>,
    job: &WorkflowJob,
    error: &str,
) {
    if let Err(e) = ctx
        .videos
        .set_job_outcome(&job.video_id, job.kind, RunStatus::Failed, Some(error))
        .await
    {
        warn!(run_id = %job.run_id, "Failed to record failed outcome: {}", e);
    }
    if let Err(e) = run_store.clear_run(&job.run_id).await {
        warn!(run_id = %job.run_id, "Failed to clear run state: {}", e);
    }
    if let Err(e) = run_store
        .release_guard(&job.video_id, job.kind, &job.run_id)
        .await
    {
        warn!(run_id = %job.run_id, "Failed to release in-flight guard: {}", e);
    }
}
