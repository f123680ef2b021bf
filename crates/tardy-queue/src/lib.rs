//! # Tardy Queue
//!
//! In-memory home for [`tardy_core::Job`] values.
//!
//! Features:
//! - Pluggable `QueueBackend` trait
//! - Due-time ordering (earliest `scheduled_at` first, FIFO on ties)
//! - Quartic retry backoff driven by `Job::configure_next_attempt`
//! - Dead letter set for exhausted jobs

pub mod backend;
pub mod entry;
pub mod memory;

pub use backend::{to_payload, QueueBackend, QueueError};
pub use entry::{JobId, JobStatus, QueuedJob, RetryOutcome};
pub use memory::{MemoryQueue, QueueConfig};
