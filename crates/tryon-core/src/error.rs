//! Domain error taxonomy.
//!
//! Every rejection the orchestrator can surface maps to exactly one
//! variant here, with a stable code for API clients.

use crate::status::{TaskState, TryOnMode};
use thiserror::Error;

/// Domain errors for the try-on orchestrator.
#[derive(Debug, Error)]
pub enum TryOnError {
    /// Task does not exist, is soft-deleted, or belongs to another user.
    #[error("try-on task not found: {0}")]
    TaskNotFound(String),

    /// Input asset does not exist, is deleted, or belongs to another user.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// Input asset exists but is not marked valid for try-on.
    #[error("asset is not valid for try-on: {0}")]
    AssetNotValid(String),

    /// Asset record exists but its file is missing from storage.
    #[error("asset file not found in storage: {0}")]
    AssetFileMissing(String),

    /// Garment count does not match the submission mode.
    #[error("{mode} mode requires exactly {expected} garment image(s), got {actual}")]
    GarmentCardinality {
        mode: TryOnMode,
        expected: usize,
        actual: usize,
    },

    /// Permanent provider rejection (4xx). No task is created.
    #[error("provider rejected submission: {0}")]
    ProviderRejected(String),

    /// Transient provider failure that survived the submit backoff.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Requested transition is not allowed from the current state.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: TaskState, to: &'static str },

    /// Retry requested on a task that already used all attempts.
    #[error("maximum retry attempts exceeded")]
    RetryLimitExceeded,

    /// Result requested for a task that has no materialized result.
    #[error("result is not available for this task")]
    ResultNotAvailable,

    /// Filesystem or record-store failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl TryOnError {
    /// Stable machine-readable code exposed to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::AssetNotFound(_) => "ASSET_NOT_FOUND",
            Self::AssetNotValid(_) => "ASSET_NOT_VALID",
            Self::AssetFileMissing(_) => "ASSET_FILE_MISSING",
            Self::GarmentCardinality { .. } => "INVALID_GARMENT_COUNT",
            Self::ProviderRejected(_) => "PROVIDER_REJECTED",
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::RetryLimitExceeded => "RETRY_LIMIT_EXCEEDED",
            Self::ResultNotAvailable => "RESULT_NOT_AVAILABLE",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_message() {
        let err = TryOnError::GarmentCardinality {
            mode: TryOnMode::Combo,
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "combo mode requires exactly 2 garment image(s), got 1"
        );
        assert_eq!(err.code(), "INVALID_GARMENT_COUNT");
    }
}
