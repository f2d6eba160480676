use std::pin::Pin;

use futures_core::Stream;
use mdcommon::{GenerationOptions, SessionId, TraceId};
use mdprovider::{StopReason, TokenUsage, ToolCall};
use mdtooling::ToolExecutionResult;

use crate::ChatError;

/// The durable identity of a conversation plus the model that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: SessionId,
    pub model: String,
    /// Prepended to every model request; never written to the store.
    pub system_prompt: Option<String>,
}

impl ChatSession {
    pub fn new(id: impl Into<SessionId>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(self, system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurnRequest {
    pub session: ChatSession,
    pub user_input: String,
    pub options: GenerationOptions,
    pub trace_id: Option<TraceId>,
}

impl ChatTurnRequest {
    pub fn new(session: ChatSession, user_input: impl Into<String>) -> Self {
        Self {
            session,
            user_input: user_input.into(),
            options: GenerationOptions::default(),
            trace_id: None,
        }
    }

    pub fn with_temperature(self, temperature: f32) -> Self {
        Self {
            options: self.options.with_temperature(temperature),
            ..self
        }
    }

    pub fn enable_streaming(self) -> Self {
        Self {
            options: self.options.enable_streaming(),
            ..self
        }
    }

    pub fn with_trace_id(self, trace_id: impl Into<TraceId>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
            ..self
        }
    }
}

/// Where a turn stands in the reason-act loop.
///
/// Starts at `AwaitingModel` and flips to `AwaitingTool` each time the model
/// asks for tools. `Done` carries the final answer, `Aborted` the notice
/// shown when the step budget runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    AwaitingModel,
    AwaitingTool(Vec<ToolCall>),
    Done(String),
    Aborted(String),
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Aborted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurnResult {
    pub session_id: SessionId,
    pub assistant_message: String,
    pub outcome: TurnOutcome,
    /// Every tool call made during the turn, in execution order.
    pub tool_executions: Vec<ToolExecutionResult>,
    /// Model calls spent, counted against the step budget.
    pub steps: u32,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl ChatTurnResult {
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Aborted)
    }
}

/// Progress of a streamed turn. `TurnComplete` is always the last item.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    TextDelta(String),
    ToolCallStarted(ToolCall),
    ToolCallFinished(ToolExecutionResult),
    TurnComplete(ChatTurnResult),
}

pub type ChatEventStream<'a> = Pin<Box<dyn Stream<Item = Result<ChatEvent, ChatError>> + Send + 'a>>;
