//! Provider error classification.

use thiserror::Error;

/// Errors from the provider HTTP client.
///
/// The split between retryable and permanent variants drives the submit
/// backoff loop and the orchestrator's synchronous-rejection path.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Permanent rejection (4xx). Never retried.
    #[error("provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Network-level failure or 5xx. Retryable.
    #[error("provider request failed: {0}")]
    Transport(String),

    /// The request hit its timeout. Retryable.
    #[error("provider request timed out")]
    Timeout,

    /// The provider responded but the body was not what we expected.
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether the submit backoff loop may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::Transport("reset".into()).is_retryable());
        assert!(!ProviderError::Rejected {
            status: 400,
            body: "bad cloth_type".into()
        }
        .is_retryable());
        assert!(!ProviderError::Decode("not json".into()).is_retryable());
    }
}
