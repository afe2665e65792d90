//! Provider error types for the topology abstraction layer.
//!
//! Every error a provider can return is classified as transient (worth
//! retrying with backoff) or permanent (surface immediately).

use std::fmt;
use std::time::Duration;

/// Errors that can occur while reading or mutating topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider is rate limiting this client.
    #[error("Throttled by provider")]
    Throttled {
        /// Delay the provider asked for, if any.
        retry_after: Option<Duration>,
    },

    /// The call did not complete in time.
    #[error("Timeout: {message}")]
    Timeout {
        /// Description of the timed out call.
        message: String,
    },

    /// The provider reported itself unavailable (5xx).
    #[error("Service unavailable: {message}")]
    Unavailable {
        /// Description of the outage.
        message: String,
    },

    /// Transport level failure.
    #[error("Network error: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// Another operation on the same resource is in progress.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting operation.
        message: String,
    },

    /// The request was rejected as malformed.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The addressed resource does not exist.
    #[error("Resource not found: {kind} {id}")]
    NotFound {
        /// Kind of resource that was not found.
        kind: String,
        /// Identifier of the resource that was not found.
        id: String,
    },

    /// The credential lacks permission for the call.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of the authorization failure.
        message: String,
    },

    /// An unclassified client-side error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl ProviderError {
    /// Creates a new `Throttled` error.
    #[must_use]
    pub fn throttled(retry_after: Option<Duration>) -> Self {
        Self::Throttled { retry_after }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `BadRequest` error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Delay requested by the provider before the next attempt.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns the retry category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Throttled { .. }
            | Self::Timeout { .. }
            | Self::Unavailable { .. }
            | Self::Network { .. }
            | Self::Conflict { .. } => ErrorCategory::Transient,
            Self::BadRequest { .. }
            | Self::NotFound { .. }
            | Self::Unauthorized { .. }
            | Self::Internal { .. } => ErrorCategory::Permanent,
        }
    }
}

/// Retry classification of provider errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network, timeout, rate limit; retried with backoff.
    Transient,
    /// Bad request, not found, authorization; never retried.
    Permanent,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}
