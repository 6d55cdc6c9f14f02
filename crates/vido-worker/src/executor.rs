//! Run executor: consumes workflow jobs from the queue with bounded
//! concurrency, redelivery-based retry and a dead-letter queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vido_queue::{RunStore, WorkflowQueue};

use crate::collaborators::JobContext;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::processor;

/// Workflow run executor.
pub struct RunExecutor {
    config: WorkerConfig,
    ctx: JobContext,
    queue: Arc<WorkflowQueue>,
    run_store: Arc<dyn RunStore>,
    run_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl RunExecutor {
    /// Create a new executor.
    pub fn new(
        config: WorkerConfig,
        ctx: JobContext,
        queue: WorkflowQueue,
        run_store: Arc<dyn RunStore>,
    ) -> Self {
        let run_semaphore = Arc::new(Semaphore::new(config.max_concurrent_runs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            ctx,
            queue: Arc::new(queue),
            run_store,
            run_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor loop.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting run executor '{}' with {} max concurrent runs",
            self.consumer_name, self.config.max_concurrent_runs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodically claim runs whose worker died; this is the crash
        // resumption path.
        let claim_task = self.spawn_claim_task();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_once() => {
                    if let Err(e) = result {
                        error!("Error consuming runs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight runs to complete...");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_runs()).await;

        info!("Run executor stopped");
        Ok(())
    }

    fn spawn_claim_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let consumer_name = self.consumer_name.clone();
        let interval = self.config.claim_interval;
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
        let ctx = self.ctx.clone();
        let run_store = Arc::clone(&self.run_store);
        let config = self.config.clone();
        let semaphore = Arc::clone(&self.run_semaphore);
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match queue.claim_pending(&consumer_name, min_idle_ms, 5).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("Claimed {} pending runs", jobs.len());
                                for (message_id, job) in jobs {
                                    let Ok(permit) =
                                        Arc::clone(&semaphore).acquire_owned().await
                                    else {
                                        return;
                                    };
                                    let ctx = ctx.clone();
                                    let queue = Arc::clone(&queue);
                                    let run_store = Arc::clone(&run_store);
                                    let config = config.clone();
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_one(
                                            ctx, queue, run_store, config, message_id, job,
                                        )
                                        .await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Failed to claim pending runs: {}", e),
                        }
                    }
                }
            }
        })
    }

    async fn consume_once(&self) -> WorkerResult<()> {
        let available = self.run_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }
        debug!("Consumed {} runs from queue", jobs.len());

        for (message_id, job) in jobs {
            let permit = Arc::clone(&self.run_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::run_failed("Semaphore closed"))?;

            let ctx = self.ctx.clone();
            let queue = Arc::clone(&self.queue);
            let run_store = Arc::clone(&self.run_store);
            let config = self.config.clone();
            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_one(ctx, queue, run_store, config, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Execute one delivery with bounded-retry semantics: a retryable
    /// failure leaves the message pending for redelivery; after
    /// `max_retries` attempts (or a permanent failure) the run is
    /// finalized as failed and moved to the DLQ.
    async fn execute_one(
        ctx: JobContext,
        queue: Arc<WorkflowQueue>,
        run_store: Arc<dyn RunStore>,
        config: WorkerConfig,
        message_id: String,
        job: vido_models::WorkflowJob,
    ) {
        metrics::counter!("vido_workflow_runs_started_total").increment(1);

        match processor::execute_run(&ctx, Arc::clone(&run_store), &config, &job).await {
            Ok(()) => {
                metrics::counter!("vido_workflow_runs_completed_total").increment(1);
                if let Err(e) = queue.ack(&message_id).await {
                    error!(run_id = %job.run_id, "Failed to ack run: {}", e);
                }
            }
            Err(WorkerError::GuardHeld) => {
                // A different live run owns this (video, kind). Drop the
                // message without touching the row: the holder's outcome
                // is the one that counts.
                metrics::counter!("vido_workflow_runs_fenced_total").increment(1);
                if let Err(e) = queue.dlq(&message_id, &job, "fenced by in-flight run").await {
                    error!(run_id = %job.run_id, "Failed to move fenced run to DLQ: {}", e);
                }
            }
            Err(e) => {
                error!(run_id = %job.run_id, kind = %job.kind, "Run failed: {}", e);

                let attempts = queue.increment_retry(&message_id).await.unwrap_or(u32::MAX);
                let exhausted = attempts >= queue.max_retries();

                if exhausted || !e.is_retryable() {
                    metrics::counter!("vido_workflow_runs_failed_total").increment(1);
                    warn!(
                        run_id = %job.run_id,
                        attempts,
                        "Run failed terminally, moving to DLQ"
                    );
                    processor::finalize_failure(&ctx, run_store, &job, &e.to_string()).await;
                    if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                        error!(run_id = %job.run_id, "Failed to move run to DLQ: {}", dlq_err);
                    }
                } else {
                    info!(
                        run_id = %job.run_id,
                        attempt = attempts,
                        max = queue.max_retries(),
                        "Run will be redelivered"
                    );
                    // Not acked: the claim loop redelivers after the
                    // visibility window and captured steps are skipped.
                }
            }
        }
    }

    async fn wait_for_runs(&self) {
        loop {
            if self.run_semaphore.available_permits() == self.config.max_concurrent_runs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
