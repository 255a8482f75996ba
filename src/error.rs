// error.rs
use thiserror::Error;

use crate::store::StoreError;

/// Failures the core surfaces to callers. Malformed records and dangling
/// references never appear here: those are absorbed where they are read,
/// with a logged warning and a safe default, because the store enforces no
/// schema and a bad row must not take a whole view down.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Transient store outage. Retry is the caller's call; the core never
    /// retries on its own.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Another photographer won the conditional write first. Terminal for
    /// this call; re-applying to the same job cannot succeed.
    #[error("job {0} is no longer available")]
    JobAlreadyTaken(String),

    #[error("{entity}: expected status {expected}, found {actual}")]
    PreconditionFailed {
        entity: String,
        expected: String,
        actual: String,
    },

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("proposal {0} not found")]
    ProposalNotFound(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::StoreUnavailable(err.to_string())
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(err: validator::ValidationErrors) -> Self {
        CoreError::Validation(err.to_string())
    }
}

impl CoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }
}
