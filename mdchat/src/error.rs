//! Chat-layer errors and classification.

use std::error::Error;
use std::fmt::{Display, Formatter};

use mdprovider::{ProviderError, ProviderErrorKind};
use mdtooling::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    InvalidRequest,
    Provider,
    Store,
    Tooling,
}

/// Stage of the turn that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorPhase {
    Request,
    Provider,
    Tooling,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatErrorSource {
    Provider(ProviderError),
    Tool(ToolError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    pub retryable: bool,
    pub phase: Option<ChatErrorPhase>,
    pub source: Option<ChatErrorSource>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: false,
            phase: None,
            source: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message).with_phase(ChatErrorPhase::Request)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Provider, message).with_phase(ChatErrorPhase::Provider)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Store, message).with_phase(ChatErrorPhase::Storage)
    }

    pub fn tooling(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Tooling, message).with_phase(ChatErrorPhase::Tooling)
    }

    pub fn with_phase(mut self, phase: ChatErrorPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// True when the caller can fix the failure by changing its input or credentials.
    pub fn is_user_error(&self) -> bool {
        match &self.source {
            Some(ChatErrorSource::Tool(error)) => error.is_user_error(),
            Some(ChatErrorSource::Provider(error)) => matches!(
                error.kind,
                ProviderErrorKind::Authentication | ProviderErrorKind::InvalidRequest
            ),
            None => self.kind == ChatErrorKind::InvalidRequest,
        }
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.phase {
            Some(phase) => write!(f, "{:?} [{:?}]: {}", self.kind, phase, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            Some(ChatErrorSource::Provider(error)) => Some(error),
            Some(ChatErrorSource::Tool(error)) => Some(error),
            None => None,
        }
    }
}

impl From<ProviderError> for ChatError {
    fn from(value: ProviderError) -> Self {
        let mut error = ChatError::provider(value.to_string()).with_retryable(value.retryable);
        error.source = Some(ChatErrorSource::Provider(value));
        error
    }
}

impl From<ToolError> for ChatError {
    fn from(value: ToolError) -> Self {
        let mut error = ChatError::tooling(value.to_string()).with_retryable(value.retryable);
        error.source = Some(ChatErrorSource::Tool(value));
        error
    }
}
