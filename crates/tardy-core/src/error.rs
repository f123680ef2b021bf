//! Job construction errors

use crate::job::MAX_ATTEMPTS_LIMIT;

/// Raised when a [`Job`](crate::Job) cannot be built from the given inputs.
///
/// Running out of attempts is not an error; see
/// [`Job::configure_next_attempt`](crate::Job::configure_next_attempt).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("Invalid job name {0:?}: must not be empty")]
    InvalidName(String),
    #[error("Invalid max_attempts {0}: must be between 1 and {max}", max = MAX_ATTEMPTS_LIMIT)]
    InvalidMaxAttempts(u32),
    #[error("Invalid attempt {attempt}: must be between 1 and max_attempts {max_attempts}")]
    InvalidAttempt { attempt: u32, max_attempts: u32 },
}

impl JobError {
    /// Every variant is an invalid-construction failure
    pub fn is_invalid_construction(&self) -> bool {
        matches!(
            self,
            Self::InvalidName(_) | Self::InvalidMaxAttempts(_) | Self::InvalidAttempt { .. }
        )
    }
}
