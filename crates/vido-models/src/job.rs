//! Workflow job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::video::VideoId;

/// Opaque identifier for one workflow invocation.
///
/// Returned synchronously by the trigger; the run itself executes out of
/// band and its captured step results live under this ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derived-asset job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Generate and store an AI thumbnail
    Thumbnail,
    /// Generate a title from the subtitle track
    Title,
    /// Generate a description from the subtitle track
    Description,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Thumbnail => "thumbnail",
            JobKind::Title => "title",
            JobKind::Description => "description",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = UnknownJobKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbnail" => Ok(JobKind::Thumbnail),
            "title" => Ok(JobKind::Title),
            "description" => Ok(JobKind::Description),
            other => Err(UnknownJobKind(other.to_string())),
        }
    }
}

/// Error for unrecognized job-kind strings (route params, queue payloads).
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown job kind: {0}")]
pub struct UnknownJobKind(pub String);

/// Outcome of a workflow run, persisted on the video row so completion is
/// observed by polling rather than a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted, waiting for a worker
    Queued,
    /// A worker is executing steps
    Running,
    /// All steps completed
    Completed,
    /// Aborted after a step failure, retries exhausted
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A queued workflow invocation.
///
/// The run is keyed by `(owner_id, video_id, kind, run_id)`; redelivery of
/// the same message resumes the same run, it does not start a new one.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowJob {
    /// Run identifier (memoization key)
    pub run_id: RunId,
    /// Owner the run is scoped to
    pub owner_id: String,
    /// Target video
    pub video_id: VideoId,
    /// Which pipeline to execute
    pub kind: JobKind,
    /// User prompt for generation job kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// When the trigger accepted the job
    pub created_at: DateTime<Utc>,
}

impl WorkflowJob {
    /// Create a new job with a fresh run ID.
    pub fn new(
        owner_id: impl Into<String>,
        video_id: VideoId,
        kind: JobKind,
    ) -> Self {
        Self {
            run_id: RunId::new(),
            owner_id: owner_id.into(),
            video_id,
            kind,
            prompt: None,
            created_at: Utc::now(),
        }
    }

    /// Set the generation prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_round_trip() {
        for kind in [JobKind::Thumbnail, JobKind::Title, JobKind::Description] {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_job_kind() {
        assert!("transcode".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_job_serde_round_trip() {
        let job = WorkflowJob::new("user_1", VideoId::from("vid_1"), JobKind::Thumbnail)
            .with_prompt("a red fox");
        let json = serde_json::to_string(&job).unwrap();
        let back: WorkflowJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, job.run_id);
        assert_eq!(back.kind, JobKind::Thumbnail);
        assert_eq!(back.prompt.as_deref(), Some("a red fox"));
    }
}
