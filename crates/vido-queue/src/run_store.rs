//! Durable run state: captured step results and the in-flight guard.
//!
//! Each workflow run owns a hash of `step name -> serialized output`. A
//! redelivered run reads the hash and skips every step already captured,
//! which is what makes resumption after a crash or timeout safe.
//!
//! The in-flight guard is a `(video_id, job_kind)` lease: two runs for the
//! same video and kind would race on the same row fields, so the trigger
//! refuses to start a second one while the first is live.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::debug;

use vido_models::{JobKind, RunId, VideoId};

use crate::error::QueueResult;

/// How long captured step results outlive their last write.
const RUN_STATE_TTL_SECS: i64 = 86400;

/// Storage seam for run state. The Redis implementation is the production
/// path; [`MemoryRunStore`] backs orchestrator tests.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Read a captured step result.
    async fn get_step(&self, run_id: &RunId, step: &str) -> QueueResult<Option<String>>;

    /// Capture a step result under its name.
    async fn put_step(&self, run_id: &RunId, step: &str, value: &str) -> QueueResult<()>;

    /// Drop all state for a finished run.
    async fn clear_run(&self, run_id: &RunId) -> QueueResult<()>;

    /// Try to take the `(video_id, kind)` lease for `run_id`. Returns
    /// false when another live run holds it. Re-acquiring with the same
    /// run ID succeeds, so a resumed run passes its own guard.
    async fn acquire_guard(
        &self,
        video_id: &VideoId,
        kind: JobKind,
        run_id: &RunId,
        ttl: Duration,
    ) -> QueueResult<bool>;

    /// Release the lease if this run still holds it.
    async fn release_guard(
        &self,
        video_id: &VideoId,
        kind: JobKind,
        run_id: &RunId,
    ) -> QueueResult<()>;
}

fn run_key(run_id: &RunId) -> String {
    format!("vido:wf:run:{}", run_id)
}

fn guard_key(video_id: &VideoId, kind: JobKind) -> String {
    format!("vido:wf:inflight:{}:{}", video_id, kind)
}

/// Redis-backed run store.
pub struct RedisRunStore {
    client: redis::Client,
}

impl RedisRunStore {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }

    pub fn from_env() -> QueueResult<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        Self::new(&url)
    }
}

#[async_trait]
impl RunStore for RedisRunStore {
    async fn get_step(&self, run_id: &RunId, step: &str) -> QueueResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.hget(run_key(run_id), step).await?;
        Ok(value)
    }

    async fn put_step(&self, run_id: &RunId, step: &str, value: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = run_key(run_id);
        conn.hset::<_, _, _, ()>(&key, step, value).await?;
        conn.expire::<_, ()>(&key, RUN_STATE_TTL_SECS).await?;
        debug!(run_id = %run_id, step, "Captured step result");
        Ok(())
    }

    async fn clear_run(&self, run_id: &RunId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(run_key(run_id)).await?;
        Ok(())
    }

    async fn acquire_guard(
        &self,
        video_id: &VideoId,
        kind: JobKind,
        run_id: &RunId,
        ttl: Duration,
    ) -> QueueResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = guard_key(video_id, kind);

        let set: bool = redis::cmd("SET")
            .arg(&key)
            .arg(run_id.as_str())
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map(|v: Option<String>| v.is_some())?;

        if set {
            return Ok(true);
        }

        // The holder may be this very run being redelivered
        let holder: Option<String> = conn.get(&key).await?;
        Ok(holder.as_deref() == Some(run_id.as_str()))
    }

    async fn release_guard(
        &self,
        video_id: &VideoId,
        kind: JobKind,
        run_id: &RunId,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = guard_key(video_id, kind);
        let holder: Option<String> = conn.get(&key).await?;
        if holder.as_deref() == Some(run_id.as_str()) {
            conn.del::<_, ()>(&key).await?;
        }
        Ok(())
    }
}

/// In-memory run store for tests and local development.
#[derive(Default)]
pub struct MemoryRunStore {
    steps: Mutex<HashMap<String, HashMap<String, String>>>,
    guards: Mutex<HashMap<String, String>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured step names for a run, in no particular order.
    pub async fn captured_steps(&self, run_id: &RunId) -> Vec<String> {
        let steps = self.steps.lock().await;
        steps
            .get(run_id.as_str())
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn get_step(&self, run_id: &RunId, step: &str) -> QueueResult<Option<String>> {
        let steps = self.steps.lock().await;
        Ok(steps
            .get(run_id.as_str())
            .and_then(|m| m.get(step))
            .cloned())
    }

    async fn put_step(&self, run_id: &RunId, step: &str, value: &str) -> QueueResult<()> {
        let mut steps = self.steps.lock().await;
        steps
            .entry(run_id.as_str().to_string())
            .or_default()
            .insert(step.to_string(), value.to_string());
        Ok(())
    }

    async fn clear_run(&self, run_id: &RunId) -> QueueResult<()> {
        let mut steps = self.steps.lock().await;
        steps.remove(run_id.as_str());
        Ok(())
    }

    async fn acquire_guard(
        &self,
        video_id: &VideoId,
        kind: JobKind,
        run_id: &RunId,
        _ttl: Duration,
    ) -> QueueResult<bool> {
        let mut guards = self.guards.lock().await;
        match guards.get(&guard_key(video_id, kind)) {
            Some(holder) => Ok(holder == run_id.as_str()),
            None => {
                guards.insert(guard_key(video_id, kind), run_id.as_str().to_string());
                Ok(true)
            }
        }
    }

    async fn release_guard(
        &self,
        video_id: &VideoId,
        kind: JobKind,
        run_id: &RunId,
    ) -> QueueResult<()> {
        let mut guards = self.guards.lock().await;
        let key = guard_key(video_id, kind);
        if guards.get(&key).map(|h| h.as_str()) == Some(run_id.as_str()) {
            guards.remove(&key);
        }
        Ok(())
    }
}
