//! Queue Backend Trait

use crate::entry::{JobId, JobStatus, QueuedJob, RetryOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tardy_core::{Job, JobError, Payload};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    NotFound(JobId),
    #[error("Job {id} is {status:?}, expected Running")]
    InvalidState { id: JobId, status: JobStatus },
    #[error("Invalid job: {0}")]
    Job(#[from] JobError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Store a job; it becomes available at its `scheduled_at`
    async fn enqueue(&self, job: Job) -> Result<JobId, QueueError>;

    /// Build a job with the queue's configuration and enqueue it
    async fn submit(
        &self,
        name: &str,
        payload: Payload<serde_json::Value>,
    ) -> Result<JobId, QueueError>;

    /// Claim the earliest job due at `now`
    async fn dequeue_due(&self, now: DateTime<Utc>) -> Result<Option<QueuedJob>, QueueError>;

    /// Claim the earliest job due right now
    async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
        self.dequeue_due(Utc::now()).await
    }

    /// Mark a running job as done and drop it from the queue.
    /// Returns the removed entry.
    async fn complete(&self, id: JobId) -> Result<QueuedJob, QueueError>;

    /// Record a failed attempt that happened at `now`.
    /// The job is either rescheduled with backoff or dead-lettered.
    async fn fail_at(
        &self,
        id: JobId,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<RetryOutcome, QueueError>;

    /// Record a failed attempt that happened just now
    async fn fail(&self, id: JobId, error: Option<String>) -> Result<RetryOutcome, QueueError> {
        self.fail_at(id, error, Utc::now()).await
    }

    /// Get a stored job
    async fn get(&self, id: JobId) -> Result<QueuedJob, QueueError>;

    /// Get job status
    async fn get_status(&self, id: JobId) -> Result<JobStatus, QueueError> {
        Ok(self.get(id).await?.status)
    }

    /// Jobs that ran out of attempts, oldest first
    async fn dead_letters(&self) -> Result<Vec<QueuedJob>, QueueError>;

    /// Number of jobs still waiting or running
    async fn len(&self) -> Result<usize, QueueError>;

    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}

/// Turn a serializable struct into a job payload.
/// The value must serialize to a JSON object.
pub fn to_payload<T: Serialize>(value: &T) -> Result<Payload<serde_json::Value>, QueueError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(QueueError::Serialization(serde::de::Error::custom(format!(
            "payload must be a JSON object, got {other}"
        )))),
    }
}
