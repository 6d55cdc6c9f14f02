//! Memoized step engine.
//!
//! A workflow run is an ordered sequence of named steps. Each step's
//! output is serialized and captured under its name in the run store the
//! first time it completes; when the same run is re-entered (retry after a
//! failure, redelivery after a crash), captured steps return their cached
//! output without executing, so only the steps after the last completed
//! one run. A failed or timed-out step aborts the remaining steps.
//!
//! Side effects that already committed are NOT rolled back on failure.
//! Every step therefore has to be an absolute operation that is safe to
//! skip on replay.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use vido_models::RunId;
use vido_queue::RunStore;

use crate::error::{WorkerError, WorkerResult};

/// Execution context for one run: the run identity plus the durable
/// captured-results store. Passed explicitly into every pipeline.
pub struct RunContext {
    run_id: RunId,
    store: Arc<dyn RunStore>,
    step_timeout: Duration,
}

impl RunContext {
    pub fn new(run_id: RunId, store: Arc<dyn RunStore>, step_timeout: Duration) -> Self {
        Self {
            run_id,
            store,
            step_timeout,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Execute a named step, memoized against the run.
    ///
    /// Replayed steps deserialize the captured output and skip the body
    /// entirely, including its side effects. A fresh execution runs under
    /// the step timeout and captures its output before returning.
    pub async fn step<T, F, Fut>(&self, name: &str, body: F) -> WorkerResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = WorkerResult<T>>,
    {
        if let Some(cached) = self.store.get_step(&self.run_id, name).await? {
            debug!(run_id = %self.run_id, step = name, "Replaying captured step result");
            return Ok(serde_json::from_str(&cached)?);
        }

        let output = tokio::time::timeout(self.step_timeout, body())
            .await
            .map_err(|_| WorkerError::StepTimeout(name.to_string()))??;

        let serialized = serde_json::to_string(&output)?;
        self.store.put_step(&self.run_id, name, &serialized).await?;
        info!(run_id = %self.run_id, step = name, "Step completed");

        Ok(output)
    }

    /// Drop captured state once the run reaches a terminal outcome.
    pub async fn clear(&self) -> WorkerResult<()> {
        self.store.clear_run(&self.run_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use vido_queue::MemoryRunStore;

    fn context(store: Arc<MemoryRunStore>) -> RunContext {
        RunContext::new(RunId::new(), store, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_step_executes_once_and_replays() {
        let store = Arc::new(MemoryRunStore::new());
        let ctx = context(Arc::clone(&store));
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let out: String = ctx
                .step("get-video", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok("vid_1".to_string()) }
                })
                .await
                .unwrap();
            assert_eq!(out, "vid_1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_step_is_not_captured() {
        let store = Arc::new(MemoryRunStore::new());
        let ctx = context(Arc::clone(&store));
        let calls = AtomicU32::new(0);

        let first: WorkerResult<String> = ctx
            .step("generate-thumbnail", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(WorkerError::run_failed("provider down")) }
            })
            .await;
        assert!(first.is_err());

        // Retried run re-executes the failed step
        let second: String = ctx
            .step("generate-thumbnail", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("https://temp/1.jpg".to_string()) }
            })
            .await
            .unwrap();
        assert_eq!(second, "https://temp/1.jpg");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_step_times_out() {
        let store = Arc::new(MemoryRunStore::new());
        let ctx = context(Arc::clone(&store));

        let result: WorkerResult<()> = ctx
            .step("upload-thumbnail", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        match result {
            Err(WorkerError::StepTimeout(step)) => assert_eq!(step, "upload-thumbnail"),
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_clear_forgets_captured_steps() {
        let store = Arc::new(MemoryRunStore::new());
        let ctx = context(Arc::clone(&store));
        let calls = AtomicU32::new(0);

        let _: u32 = ctx
            .step("get-video", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }
            })
            .await
            .unwrap();
        ctx.clear().await.unwrap();
        let _: u32 = ctx
            .step("get-video", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(2) }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
