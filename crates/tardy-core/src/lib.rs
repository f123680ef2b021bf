//! # Tardy Core
//!
//! Retry scheduling for deferred jobs:
//! - [`Job`] — immutable unit of work with attempt bookkeeping
//! - [`backoff`] — quartic delay between attempts (`n^4 + 5` seconds)
//! - [`JobError`] — construction failures
//!
//! The crate performs no I/O and keeps no global state. Storing jobs, finding
//! due ones and running them is left to a queue such as `tardy-queue`.
//!
//! ```
//! use chrono::Utc;
//! use tardy_core::{Job, JobConfig};
//!
//! let config = JobConfig::default().with_max_attempts(3);
//! let job = Job::with_config("send-email", [("to", "ops@example.com")], &config)?;
//!
//! let now = Utc::now();
//! let retry = job.configure_next_attempt(now).expect("attempts left");
//! assert_eq!(retry.attempt(), 2);
//! assert_eq!((retry.scheduled_at() - now).num_seconds(), 21);
//! # Ok::<(), tardy_core::JobError>(())
//! ```

pub mod backoff;
pub mod error;
pub mod job;

pub use error::JobError;
pub use job::{Job, JobConfig, Payload, DEFAULT_MAX_ATTEMPTS, MAX_ATTEMPTS_LIMIT};
