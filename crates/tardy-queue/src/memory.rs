//! In-memory queue implementation with delay scheduling

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use tardy_core::{backoff, Job, JobConfig, Payload};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::{QueueBackend, QueueError};
use crate::entry::{JobId, JobStatus, QueuedJob, RetryOutcome};

/// Queue configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Applied to jobs built through [`QueueBackend::submit`]
    pub job: JobConfig,
}

/// Priority entry for the heap - orders by run_at time (earliest first),
/// then by insertion sequence
#[derive(Debug, Clone, Eq, PartialEq)]
struct PriorityEntry {
    run_at: DateTime<Utc>,
    seq: u64,
    id: Uuid,
}

impl Ord for PriorityEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order: earlier run_at = higher priority
        other
            .run_at
            .cmp(&self.run_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct State {
    jobs: HashMap<Uuid, QueuedJob>,
    queue: BinaryHeap<PriorityEntry>,
    dead: Vec<Uuid>,
    seq: u64,
}

impl State {
    fn schedule(&mut self, id: Uuid, run_at: DateTime<Utc>) {
        self.seq += 1;
        self.queue.push(PriorityEntry {
            run_at,
            seq: self.seq,
            id,
        });
    }

    fn running_mut(&mut self, id: Uuid) -> Result<&mut QueuedJob, QueueError> {
        let entry = self.jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if entry.status != JobStatus::Running {
            return Err(QueueError::InvalidState {
                id,
                status: entry.status,
            });
        }
        Ok(entry)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryQueue {
    config: QueueConfig,
    state: Arc<RwLock<State>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            config,
            state: Arc::default(),
        }
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn enqueue(&self, job: Job) -> Result<JobId, QueueError> {
        let id = Uuid::new_v4();
        let run_at = job.scheduled_at();

        tracing::debug!(
            job_id = %id,
            job_name = job.name(),
            scheduled_at = %run_at,
            "Enqueued job"
        );

        let entry = QueuedJob {
            id,
            job,
            status: JobStatus::Pending,
            enqueued_at: Utc::now(),
            last_error: None,
        };

        let mut state = self.state.write().await;
        state.jobs.insert(id, entry);
        state.schedule(id, run_at);

        Ok(id)
    }

    async fn submit(
        &self,
        name: &str,
        payload: Payload<serde_json::Value>,
    ) -> Result<JobId, QueueError> {
        let job = Job::with_config(name, payload, &self.config.job)?;
        self.enqueue(job).await
    }

    async fn dequeue_due(&self, now: DateTime<Utc>) -> Result<Option<QueuedJob>, QueueError> {
        let mut state = self.state.write().await;

        while let Some(top) = state.queue.peek() {
            if top.run_at > now {
                break;
            }
            let Some(entry) = state.queue.pop() else {
                break;
            };

            // Skip heap entries superseded by a later reschedule
            if let Some(job) = state.jobs.get_mut(&entry.id) {
                if job.status == JobStatus::Pending && job.job.scheduled_at() == entry.run_at {
                    job.status = JobStatus::Running;
                    tracing::debug!(
                        job_id = %entry.id,
                        job_name = job.job.name(),
                        attempt = job.job.attempt(),
                        "Claimed job"
                    );
                    return Ok(Some(job.clone()));
                }
            }
        }

        Ok(None)
    }

    async fn complete(&self, id: JobId) -> Result<QueuedJob, QueueError> {
        let mut state = self.state.write().await;
        state.running_mut(id)?;
        let mut entry = state.jobs.remove(&id).ok_or(QueueError::NotFound(id))?;
        entry.status = JobStatus::Completed;
        entry.last_error = None;

        tracing::debug!(
            job_id = %id,
            job_name = entry.job.name(),
            attempt = entry.job.attempt(),
            "Job completed, removed from queue"
        );

        Ok(entry)
    }

    async fn fail_at(
        &self,
        id: JobId,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<RetryOutcome, QueueError> {
        let mut state = self.state.write().await;
        let entry = state.running_mut(id)?;
        entry.last_error = error;

        match entry.job.configure_next_attempt(now) {
            Some(next) => {
                let attempt = next.attempt();
                let scheduled_at = next.scheduled_at();

                tracing::info!(
                    job_id = %id,
                    job_name = next.name(),
                    attempt,
                    max_attempts = next.max_attempts(),
                    delay_secs = backoff::delay(attempt).as_secs(),
                    scheduled_at = %scheduled_at,
                    error = entry.last_error.as_deref().unwrap_or_default(),
                    "Job failed, scheduling retry with backoff"
                );

                entry.job = next;
                entry.status = JobStatus::Pending;
                state.schedule(id, scheduled_at);

                Ok(RetryOutcome::Rescheduled {
                    attempt,
                    scheduled_at,
                })
            }
            None => {
                let attempts = entry.job.attempt();
                entry.status = JobStatus::DeadLetter;

                tracing::warn!(
                    job_id = %id,
                    job_name = entry.job.name(),
                    attempts,
                    error = entry.last_error.as_deref().unwrap_or_default(),
                    "Job exhausted its attempts, moving to dead letter"
                );

                state.dead.push(id);
                Ok(RetryOutcome::Exhausted { attempts })
            }
        }
    }

    async fn get(&self, id: JobId) -> Result<QueuedJob, QueueError> {
        let state = self.state.read().await;
        state.jobs.get(&id).cloned().ok_or(QueueError::NotFound(id))
    }

    async fn dead_letters(&self) -> Result<Vec<QueuedJob>, QueueError> {
        let state = self.state.read().await;
        Ok(state
            .dead
            .iter()
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .values()
            .filter(|entry| !entry.status.is_terminal())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn job_at(name: &str, at: DateTime<Utc>) -> Job {
        Job::new_at(name, [("foo", json!("bar"))], &JobConfig::default(), at).unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_dequeue() {
        let queue = MemoryQueue::new();

        let id = queue.enqueue(job_at("test_job", t0())).await.unwrap();
        assert_eq!(queue.get_status(id).await.unwrap(), JobStatus::Pending);

        let entry = queue.dequeue_due(t0()).await.unwrap().expect("Should have job");
        assert_eq!(entry.id, id);
        assert_eq!(entry.job.name(), "test_job");
        assert_eq!(entry.status, JobStatus::Running);
        assert_eq!(entry.job.payload()["foo"], "bar");

        assert!(queue.dequeue_due(t0()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_future_job_not_due() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue(job_at("later", t0() + Duration::seconds(30)))
            .await
            .unwrap();

        assert!(queue.dequeue_due(t0()).await.unwrap().is_none());
        let entry = queue
            .dequeue_due(t0() + Duration::seconds(30))
            .await
            .unwrap()
            .expect("due at its scheduled time");
        assert_eq!(entry.id, id);
    }

    #[tokio::test]
    async fn test_earliest_first_then_fifo() {
        let queue = MemoryQueue::new();
        let late = queue
            .enqueue(job_at("late", t0() + Duration::seconds(5)))
            .await
            .unwrap();
        let first = queue.enqueue(job_at("first", t0())).await.unwrap();
        let second = queue.enqueue(job_at("second", t0())).await.unwrap();

        let now = t0() + Duration::seconds(10);
        let order: Vec<_> = [
            queue.dequeue_due(now).await.unwrap().unwrap().id,
            queue.dequeue_due(now).await.unwrap().unwrap().id,
            queue.dequeue_due(now).await.unwrap().unwrap().id,
        ]
        .into();
        assert_eq!(order, vec![first, second, late]);
    }

    #[tokio::test]
    async fn test_fail_reschedules_with_backoff() {
        let queue = MemoryQueue::new();
        let id = queue.enqueue(job_at("flaky", t0())).await.unwrap();
        queue.dequeue_due(t0()).await.unwrap().unwrap();

        let outcome = queue
            .fail_at(id, Some("timeout".to_string()), t0())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RetryOutcome::Rescheduled {
                attempt: 2,
                scheduled_at: t0() + Duration::seconds(21),
            }
        );

        let entry = queue.get(id).await.unwrap();
        assert_eq!(entry.status, JobStatus::Pending);
        assert_eq!(entry.job.attempt(), 2);
        assert_eq!(entry.last_error.as_deref(), Some("timeout"));

        assert!(queue
            .dequeue_due(t0() + Duration::seconds(20))
            .await
            .unwrap()
            .is_none());
        assert!(queue
            .dequeue_due(t0() + Duration::seconds(21))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_exhausted_job_dead_lettered() {
        let config = QueueConfig {
            job: JobConfig::default().with_max_attempts(1),
        };
        let queue = MemoryQueue::with_config(config);
        let id = queue.submit("once", Payload::new()).await.unwrap();
        queue.dequeue().await.unwrap().unwrap();

        let outcome = queue.fail(id, Some("boom".to_string())).await.unwrap();
        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 1 });
        assert_eq!(queue.get_status(id).await.unwrap(), JobStatus::DeadLetter);

        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, id);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_complete_requires_running() {
        let queue = MemoryQueue::new();
        let id = queue.enqueue(job_at("job", t0())).await.unwrap();

        let err = queue.complete(id).await.unwrap_err();
        assert!(matches!(
            err,
            QueueError::InvalidState {
                status: JobStatus::Pending,
                ..
            }
        ));

        queue.dequeue_due(t0()).await.unwrap().unwrap();
        let done = queue.complete(id).await.unwrap();
        assert_eq!(done.id, id);
        assert_eq!(done.status, JobStatus::Completed);

        assert!(matches!(
            queue.get_status(id).await,
            Err(QueueError::NotFound(_))
        ));
        assert!(matches!(
            queue.fail_at(id, None, t0()).await,
            Err(QueueError::NotFound(_))
        ));
        assert!(matches!(
            queue.complete(id).await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_completed_jobs_are_not_retained() {
        let queue = MemoryQueue::new();
        let mut ids = Vec::new();
        for i in 0..1000 {
            ids.push(queue.enqueue(job_at(&format!("job-{i}"), t0())).await.unwrap());
        }

        while let Some(entry) = queue.dequeue_due(t0()).await.unwrap() {
            queue.complete(entry.id).await.unwrap();
        }

        assert!(queue.is_empty().await.unwrap());
        assert!(queue.state.read().await.jobs.is_empty());
        for id in ids {
            assert!(queue.get(id).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let queue = MemoryQueue::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            queue.get(id).await,
            Err(QueueError::NotFound(missing)) if missing == id
        ));
        assert!(matches!(
            queue.fail(id, None).await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_name() {
        let queue = MemoryQueue::new();
        let err = queue.submit("", Payload::new()).await.unwrap_err();
        assert!(matches!(err, QueueError::Job(e) if e.is_invalid_construction()));
        assert!(queue.is_empty().await.unwrap());
    }
}
