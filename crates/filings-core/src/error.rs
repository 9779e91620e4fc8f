//! Error types for filing resolution and retrieval.
//!
//! This module defines [`FilingError`], which covers every failure the engine can
//! surface: missing identifiers, upstream refusal, transient network trouble,
//! malformed payloads, exhausted retry budgets and partially failed batches.

use thiserror::Error;

/// Errors that can occur while resolving companies or retrieving filings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilingError {
    /// The identifier has no corresponding upstream resource.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The upstream source refused or rate limited the request.
    #[error("Blocked by upstream: {reason}")]
    Blocked {
        /// HTTP status returned by the upstream, if any.
        status: Option<u16>,
        /// Human-readable reason.
        reason: String,
    },

    /// Timeout, connection reset or a server-side (5xx) failure.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// The body parsed (or failed to parse) without the structure we require.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Every allowed attempt failed with a retryable error.
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts that were made.
        attempts: u32,
        /// The failure observed on the final attempt.
        last: Box<FilingError>,
    },

    /// Some members of a multi-company aggregation failed.
    #[error("{failed} of {total} companies could not be retrieved")]
    PartialBatch {
        /// Number of companies that failed.
        failed: usize,
        /// Number of companies in the batch.
        total: usize,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The operation was cancelled before it was dispatched.
    #[error("Cancelled")]
    Cancelled,

    /// Error interacting with a persistence backend.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl FilingError {
    /// Shorthand for a [`FilingError::Blocked`] carrying an HTTP status.
    #[must_use]
    pub fn blocked(status: u16, reason: impl Into<String>) -> Self {
        Self::Blocked {
            status: Some(status),
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// HTTP 429 is the only `Blocked` status that is retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransientNetwork(_) | Self::MalformedResponse(_) => true,
            Self::Blocked { status, .. } => *status == Some(429),
            _ => false,
        }
    }

    /// Returns true if the failure was caused by the upstream being unreachable,
    /// refusing service, or returning unusable data, as opposed to the resource
    /// genuinely not existing.
    #[must_use]
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            Self::Blocked { .. }
                | Self::TransientNetwork(_)
                | Self::MalformedResponse(_)
                | Self::Exhausted { .. }
        )
    }

    /// User-facing remedy for this error.
    #[must_use]
    pub fn remedy(&self) -> &'static str {
        match self {
            Self::Blocked { .. }
            | Self::Exhausted { .. }
            | Self::TransientNetwork(_)
            | Self::MalformedResponse(_) => {
                "The filing service is unavailable right now. Try again later, or enter the CIK directly."
            }
            Self::NotFound(_) => "Verify the ticker symbol or CIK and try again.",
            Self::PartialBatch { .. } => {
                "Some companies could not be loaded; results are shown for the rest."
            }
            Self::InvalidParameter(_) => "Check the input and try again.",
            Self::Cancelled => "The request was cancelled.",
            Self::Storage(_) | Self::Other(_) => "An unexpected error occurred.",
        }
    }
}

/// Result type alias using [`FilingError`].
pub type Result<T> = std::result::Result<T, FilingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FilingError::TransientNetwork("reset".into()).is_retryable());
        assert!(FilingError::MalformedResponse("no table".into()).is_retryable());
        assert!(FilingError::blocked(429, "slow down").is_retryable());
        assert!(!FilingError::blocked(403, "forbidden").is_retryable());
        assert!(!FilingError::NotFound("x".into()).is_retryable());

        let exhausted = FilingError::Exhausted {
            attempts: 3,
            last: Box::new(FilingError::TransientNetwork("timeout".into())),
        };
        assert!(!exhausted.is_retryable());
        assert!(exhausted.is_upstream_failure());
    }

    #[test]
    fn test_remedies_differ_by_kind() {
        let blocked = FilingError::blocked(403, "forbidden").remedy();
        let missing = FilingError::NotFound("ZZZZ".into()).remedy();
        assert_ne!(blocked, missing);
        assert!(blocked.contains("Try again later"));
        assert!(missing.contains("Verify"));
    }

    #[test]
    fn test_exhausted_display_includes_last_reason() {
        let err = FilingError::Exhausted {
            attempts: 4,
            last: Box::new(FilingError::TransientNetwork("HTTP 503".into())),
        };
        let text = err.to_string();
        assert!(text.contains("4 attempts"));
        assert!(text.contains("HTTP 503"));
    }
}
