//! Errors raised by upstream data sources before the tool boundary contains them.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Connection failure or body read failure.
    Transport,
    Timeout,
    /// Upstream answered with a non-success status.
    Status,
    /// Upstream answered, but not in the expected shape.
    Decode,
    /// Upstream knows nothing about the requested symbol.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Transport, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn status(status: u16, what: &str) -> Self {
        Self::new(
            SourceErrorKind::Status,
            format!("{what} returned HTTP {status}"),
        )
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Decode, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NotFound, message)
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, what: &str) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("{what} timed out: {err}"))
        } else if err.is_decode() {
            Self::decode(format!("{what} sent an unreadable body: {err}"))
        } else {
            Self::transport(format!("{what} request failed: {err}"))
        }
    }
}

/// Renders only the message; this text is what a caller sees in `{error}`.
impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for SourceError {}
