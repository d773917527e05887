//! Delivery failure classification.

use std::time::Duration;

/// Why a delivery attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Network error, timeout, 5xx or remote rate limiting. Retried with
    /// backoff until the attempt budget is spent.
    #[error("transient delivery failure: {reason}")]
    Transient {
        /// Failure description.
        reason: String,
        /// Minimum wait requested by the remote, if any.
        retry_after: Option<Duration>,
    },

    /// Rejected request or malformed payload. Dead-lettered without retry.
    #[error("permanent delivery failure: {reason}")]
    Permanent {
        /// Failure description.
        reason: String,
    },
}

impl DeliveryError {
    /// Returns `true` for [`DeliveryError::Transient`].
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Remote retry hint, for transient failures that carry one.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            Self::Permanent { .. } => None,
        }
    }

    /// Failure description.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Transient { reason, .. } | Self::Permanent { reason } => reason,
        }
    }
}
