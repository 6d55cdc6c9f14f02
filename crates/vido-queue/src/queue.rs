//! Workflow queue using Redis Streams.
//!
//! Triggers enqueue a [`WorkflowJob`]; workers consume through a consumer
//! group. A failed run is simply not acked: the claim loop redelivers it
//! after the visibility window, with an attempt counter bounding retries
//! before the job moves to the dead-letter stream.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use vido_models::WorkflowJob;

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for workflow jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Max retries before DLQ
    pub max_retries: u32,
    /// Job visibility timeout before redelivery
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vido:workflows".to_string(),
            consumer_group: "vido:workers".to_string(),
            dlq_stream_name: "vido:workflows:dlq".to_string(),
            max_retries: 3,
            visibility_timeout: Duration::from_secs(300),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("WORKFLOW_STREAM")
                .unwrap_or_else(|_| "vido:workflows".to_string()),
            consumer_group: std::env::var("WORKFLOW_CONSUMER_GROUP")
                .unwrap_or_else(|_| "vido:workers".to_string()),
            dlq_stream_name: std::env::var("WORKFLOW_DLQ_STREAM")
                .unwrap_or_else(|_| "vido:workflows:dlq".to_string()),
            max_retries: std::env::var("WORKFLOW_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            visibility_timeout: Duration::from_secs(
                std::env::var("WORKFLOW_VISIBILITY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }
}

/// Workflow queue client.
pub struct WorkflowQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl WorkflowQueue {
    /// Create a new workflow queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a workflow job.
    pub async fn enqueue(&self, job: &WorkflowJob) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("run_id")
            .arg(job.run_id.as_str())
            .query_async(&mut conn)
            .await?;

        info!(
            run_id = %job.run_id,
            kind = %job.kind,
            "Enqueued workflow job with message ID {}",
            message_id
        );

        Ok(message_id)
    }

    /// Acknowledge a job (run reached a terminal outcome).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged workflow message: {}", message_id);
        Ok(())
    }

    /// Move a job to the dead letter queue after retries are exhausted.
    pub async fn dlq(&self, message_id: &str, job: &WorkflowJob, error: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!(run_id = %job.run_id, "Moved workflow run to DLQ: {}", error);
        Ok(())
    }

    /// Consume new jobs for this consumer.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, WorkflowJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for stream_key in result.keys {
            for entry in stream_key.ids {
                if let Some((message_id, job)) = self.decode_entry(entry.id, &entry.map).await {
                    jobs.push((message_id, job));
                }
            }
        }

        Ok(jobs)
    }

    /// Claim jobs whose consumer stopped heartbeating (crashed worker or
    /// expired visibility window). This is the redelivery path that makes
    /// resumption happen.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, WorkflowJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let result: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for entry in result.ids {
            if let Some((message_id, job)) = self.decode_entry(entry.id, &entry.map).await {
                info!(run_id = %job.run_id, "Claimed pending workflow run");
                jobs.push((message_id, job));
            }
        }

        Ok(jobs)
    }

    async fn decode_entry(
        &self,
        message_id: String,
        map: &std::collections::HashMap<String, redis::Value>,
    ) -> Option<(String, WorkflowJob)> {
        if let Some(redis::Value::BulkString(payload)) = map.get("job") {
            let payload_str = String::from_utf8_lossy(payload);
            match serde_json::from_str::<WorkflowJob>(&payload_str) {
                Ok(job) => return Some((message_id, job)),
                Err(e) => {
                    warn!("Failed to parse workflow payload: {}", e);
                    // Ack the malformed message to prevent reprocessing
                    self.ack(&message_id).await.ok();
                }
            }
        }
        None
    }

    /// Delivery attempts so far for a message.
    pub async fn get_retry_count(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("vido:wf:retry:{}", message_id);
        let count: Option<u32> = conn.get(&key).await?;
        Ok(count.unwrap_or(0))
    }

    /// Increment the attempt counter for a message.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("vido:wf:retry:{}", message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, 86400).await?;
        Ok(count)
    }

    /// Queue length, for health reporting.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Max retries from config.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Visibility timeout from config.
    pub fn visibility_timeout(&self) -> Duration {
        self.config.visibility_timeout
    }
}
