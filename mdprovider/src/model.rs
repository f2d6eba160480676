//! Conversation and request types shared by every provider adapter.
//!
//! ```rust
//! use mdprovider::{Message, ModelRequest, ProviderErrorKind, Role, ToolCall};
//!
//! let history = vec![
//!     Message::new(Role::User, "How is AAPL doing?"),
//!     Message::assistant_tool_calls(vec![ToolCall {
//!         id: "call_1".to_string(),
//!         name: "stock_summary".to_string(),
//!         arguments: r#"{"ticker":"AAPL"}"#.to_string(),
//!     }]),
//!     Message::tool_result("call_1", "AAPL Summary: ..."),
//! ];
//! assert!(ModelRequest::new("gpt-4.1-mini", history).validate().is_ok());
//!
//! let err = ModelRequest::new("", vec![Message::new(Role::User, "hi")])
//!     .validate()
//!     .expect_err("blank model");
//! assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
//! ```

use std::fmt::{Display, Formatter};

use mdcommon::{GenerationOptions, MetadataMap};

use crate::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenAi,
}

impl ProviderId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub const ALL: [Role; 4] = [Self::System, Self::User, Self::Assistant, Self::Tool];

    /// Lower-case name used on the wire and in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == value)
    }
}

/// One conversation turn.
///
/// Assistant turns may request tools through `tool_calls`. A `Role::Tool`
/// turn answers exactly one of those requests and names it in `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// An assistant turn with no text that only requests tools.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::new(Role::Assistant, "").with_tool_calls(tool_calls)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, output)
        }
    }

    pub fn with_tool_calls(self, tool_calls: Vec<ToolCall>) -> Self {
        Self { tool_calls, ..self }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

impl From<ToolResult> for Message {
    fn from(value: ToolResult) -> Self {
        Self::tool_result(value.tool_call_id, value.output)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the argument object, kept as serialized text.
    pub input_schema: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON text exactly as the model produced it.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputItem {
    Message(Message),
    ToolCall(ToolCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    Cancelled,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Adds `other` in place, saturating at `u32::MAX`.
    pub fn accumulate(&mut self, other: TokenUsage) {
        *self = Self {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub provider: ProviderId,
    pub model: String,
    pub output: Vec<OutputItem>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl ModelResponse {
    /// Concatenated assistant text, in output order.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for item in &self.output {
            if let OutputItem::Message(message) = item
                && message.role == Role::Assistant
            {
                text.push_str(&message.content);
            }
        }
        text
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        let mut calls = Vec::new();
        for item in &self.output {
            if let OutputItem::ToolCall(call) = item {
                calls.push(call.clone());
            }
        }
        calls
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub options: GenerationOptions,
    pub tools: Vec<ToolDefinition>,
    /// Correlation fields for logs; never sent to the model.
    pub metadata: MetadataMap,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            options: GenerationOptions::default(),
            tools: Vec::new(),
            metadata: MetadataMap::new(),
        }
    }

    pub fn with_options(self, options: GenerationOptions) -> Self {
        Self { options, ..self }
    }

    pub fn with_temperature(self, temperature: f32) -> Self {
        let options = self.options.with_temperature(temperature);
        self.with_options(options)
    }

    pub fn with_tools(self, tools: Vec<ToolDefinition>) -> Self {
        Self { tools, ..self }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Checks the invariants every adapter relies on before anything is sent.
    pub fn validate(&self) -> Result<(), ProviderError> {
        match self.violation() {
            Some(reason) => Err(ProviderError::invalid_request(reason)),
            None => Ok(()),
        }
    }

    fn violation(&self) -> Option<&'static str> {
        if self.model.trim().is_empty() {
            return Some("model must not be empty");
        }
        if self.messages.is_empty() {
            return Some("at least one message is required");
        }
        if self.options.max_tokens == Some(0) {
            return Some("max_tokens must be greater than zero");
        }
        if self
            .options
            .temperature
            .is_some_and(|temperature| !(0.0..=2.0).contains(&temperature))
        {
            return Some("temperature must be within 0.0..=2.0");
        }
        if self
            .messages
            .iter()
            .any(|message| message.role == Role::Tool && message.tool_call_id.is_none())
        {
            return Some("tool messages must reference a tool call id");
        }
        None
    }
}
