//! Classified failures from a model endpoint.
//!
//! ```rust
//! use mdprovider::{ProviderError, ProviderErrorKind};
//!
//! let limited = ProviderError::from_status(429, "slow down");
//! assert_eq!(limited.kind, ProviderErrorKind::RateLimited);
//! assert!(limited.retryable);
//!
//! assert!(!ProviderError::authentication("bad key").retryable);
//! ```

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    RateLimited,
    InvalidRequest,
    Timeout,
    Transport,
    Unavailable,
    Other,
}

impl ProviderErrorKind {
    /// Kinds where sending the same request again may succeed.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::Transport | Self::Unavailable
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::InvalidRequest => "invalid_request",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::Unavailable => "unavailable",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    fn classified(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, kind.is_transient())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::classified(ProviderErrorKind::Authentication, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::classified(ProviderErrorKind::RateLimited, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::classified(ProviderErrorKind::InvalidRequest, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::classified(ProviderErrorKind::Timeout, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::classified(ProviderErrorKind::Transport, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::classified(ProviderErrorKind::Unavailable, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::classified(ProviderErrorKind::Other, message)
    }

    /// Maps a non-success HTTP status; unlisted 5xx codes count as transport faults.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Authentication,
            429 => ProviderErrorKind::RateLimited,
            408 | 504 => ProviderErrorKind::Timeout,
            400 | 404 | 413 | 422 => ProviderErrorKind::InvalidRequest,
            502 | 503 | 529 => ProviderErrorKind::Unavailable,
            500..=599 => ProviderErrorKind::Transport,
            _ => ProviderErrorKind::Other,
        };
        Self::classified(kind, message)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model provider {}: {}", self.kind.as_str(), self.message)
    }
}

impl Error for ProviderError {}
