//! Queue entry definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tardy_core::Job;
use uuid::Uuid;

/// Job Identifier
pub type JobId = Uuid;

/// Job Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting for its scheduled time
    Pending,
    /// Claimed by a consumer
    Running,
    /// Successfully completed
    Completed,
    /// Permanently failed after max attempts
    DeadLetter,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::DeadLetter)
    }
}

/// What happened to a job after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryOutcome {
    /// Re-queued for another attempt
    Rescheduled {
        attempt: u32,
        scheduled_at: DateTime<Utc>,
    },
    /// Attempt ceiling reached; moved to the dead letter set
    Exhausted { attempts: u32 },
}

/// A stored job entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: JobId,
    pub job: Job,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
    pub last_error: Option<String>,
}
