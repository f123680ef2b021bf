//! Job definitions
//!
//! A [`Job`] is an immutable snapshot of one unit of deferred work. Failing
//! an attempt never changes a `Job` in place: [`Job::configure_next_attempt`]
//! hands back a fresh value for the next attempt, or `None` once the attempt
//! ceiling is reached.

use crate::backoff;
use crate::error::JobError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attempt ceiling used when no [`JobConfig`] is given
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Largest accepted `max_attempts`
pub const MAX_ATTEMPTS_LIMIT: u32 = 1000;

/// Key/value data carried by a job
pub type Payload<V> = BTreeMap<String, V>;

/// Per-job retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Highest attempt ordinal a job may reach
    pub max_attempts: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl JobConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Check the ceiling is within `1..=MAX_ATTEMPTS_LIMIT`
    pub fn validate(&self) -> Result<(), JobError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(JobError::InvalidMaxAttempts(self.max_attempts));
        }
        Ok(())
    }
}

/// One schedulable unit of work and its retry state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawJob<V>", bound(deserialize = "V: Deserialize<'de>"))]
pub struct Job<V = serde_json::Value> {
    name: String,
    payload: Payload<V>,
    attempt: u32,
    max_attempts: u32,
    scheduled_at: DateTime<Utc>,
}

impl<V> Job<V> {
    /// Create a job with the default configuration, due immediately.
    pub fn new<K>(name: &str, payload: impl IntoIterator<Item = (K, V)>) -> Result<Self, JobError>
    where
        K: Into<String>,
    {
        Self::with_config(name, payload, &JobConfig::default())
    }

    /// Create a job with an explicit attempt ceiling, due immediately.
    pub fn with_config<K>(
        name: &str,
        payload: impl IntoIterator<Item = (K, V)>,
        config: &JobConfig,
    ) -> Result<Self, JobError>
    where
        K: Into<String>,
    {
        Self::new_at(name, payload, config, Utc::now())
    }

    /// Create a job that becomes due at `now`.
    pub fn new_at<K>(
        name: &str,
        payload: impl IntoIterator<Item = (K, V)>,
        config: &JobConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, JobError>
    where
        K: Into<String>,
    {
        if name.trim().is_empty() {
            return Err(JobError::InvalidName(name.to_string()));
        }
        config.validate()?;

        Ok(Self {
            name: name.to_string(),
            payload: payload.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            attempt: 1,
            max_attempts: config.max_attempts,
            scheduled_at: now,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Payload<V> {
        &self.payload
    }

    /// Ordinal of the attempt this job represents (1-based)
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// When this job becomes eligible to run
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }

    /// True when a failure of this attempt exhausts the job
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

impl<V: Clone> Job<V> {
    /// Schedule the attempt after this one.
    ///
    /// `reference_time` is the moment the current attempt failed. The
    /// returned job has `attempt + 1` and becomes due
    /// [`backoff::delay_seconds`]`(attempt + 1)` seconds after
    /// `reference_time`. Returns `None` when the next attempt would exceed
    /// `max_attempts`; the job is exhausted and must not be retried.
    pub fn configure_next_attempt(&self, reference_time: DateTime<Utc>) -> Option<Self> {
        let next_attempt = self.attempt.checked_add(1)?;
        if next_attempt > self.max_attempts {
            return None;
        }

        Some(Self {
            name: self.name.clone(),
            payload: self.payload.clone(),
            attempt: next_attempt,
            max_attempts: self.max_attempts,
            scheduled_at: backoff::next_run_at(next_attempt, reference_time),
        })
    }
}

/// Wire shape checked before becoming a [`Job`]
#[derive(Deserialize)]
struct RawJob<V> {
    name: String,
    payload: Payload<V>,
    attempt: u32,
    max_attempts: u32,
    scheduled_at: DateTime<Utc>,
}

impl<V> TryFrom<RawJob<V>> for Job<V> {
    type Error = JobError;

    fn try_from(raw: RawJob<V>) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(JobError::InvalidName(raw.name));
        }
        JobConfig::default()
            .with_max_attempts(raw.max_attempts)
            .validate()?;
        if raw.attempt == 0 || raw.attempt > raw.max_attempts {
            return Err(JobError::InvalidAttempt {
                attempt: raw.attempt,
                max_attempts: raw.max_attempts,
            });
        }

        Ok(Self {
            name: raw.name,
            payload: raw.payload,
            attempt: raw.attempt,
            max_attempts: raw.max_attempts,
            scheduled_at: raw.scheduled_at,
        })
    }
}
