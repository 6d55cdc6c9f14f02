//! Workflow job pipelines.

pub mod summary;
pub mod thumbnail;

use vido_models::{JobKind, WorkflowJob};

use crate::collaborators::JobContext;
use crate::error::WorkerResult;
use crate::workflow::RunContext;

/// Dispatch one run to its pipeline.
pub async fn execute(ctx: &JobContext, run: &RunContext, job: &WorkflowJob) -> WorkerResult<()> {
    match job.kind {
        JobKind::Thumbnail => thumbnail::run(ctx, run, job).await,
        JobKind::Title => summary::run_title(ctx, run, job).await,
        JobKind::Description => summary::run_description(ctx, run, job).await,
    }
}
