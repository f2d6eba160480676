//! Failures raised while resolving, binding, or running a tool call.

use std::error::Error;
use std::fmt;

use mdprovider::Retryable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    /// No tool is registered under the requested name.
    NotFound,
    /// Argument text did not parse, or did not fit the descriptor.
    InvalidArguments,
    /// The tool body failed.
    Execution,
    Timeout,
    /// The registry could not be reached, or answered outside the protocol.
    Transport,
    Other,
}

impl ToolErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidArguments => "invalid_arguments",
            Self::Execution => "execution",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::Other => "other",
        }
    }

    fn retryable_by_default(self) -> bool {
        matches!(self, Self::Timeout | Self::Transport)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    pub retryable: bool,
    pub tool_name: Option<String>,
    pub tool_call_id: Option<String>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            tool_name: None,
            tool_call_id: None,
        }
    }

    fn of_kind(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, kind.retryable_by_default())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::of_kind(ToolErrorKind::NotFound, message)
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::of_kind(ToolErrorKind::InvalidArguments, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::of_kind(ToolErrorKind::Execution, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::of_kind(ToolErrorKind::Timeout, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::of_kind(ToolErrorKind::Transport, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::of_kind(ToolErrorKind::Other, message)
    }

    pub fn with_tool_name(self, tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            ..self
        }
    }

    pub fn with_tool_call_id(self, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..self
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// The caller asked for something the catalog cannot satisfy, as opposed
    /// to the tool or the wire failing.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.kind,
            ToolErrorKind::NotFound | ToolErrorKind::InvalidArguments
        )
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tool_name) = &self.tool_name {
            write!(f, "{tool_name}")?;
            if let Some(call_id) = &self.tool_call_id {
                write!(f, "#{call_id}")?;
            }
            f.write_str(" ")?;
        }
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl Error for ToolError {}

impl Retryable for ToolError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }
}
