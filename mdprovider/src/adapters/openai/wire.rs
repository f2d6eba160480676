//! Chat Completions payloads, built straight from provider-agnostic requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Message, ModelRequest, ModelResponse, OutputItem, ProviderError, ProviderId, Role, StopReason,
    TokenUsage, ToolCall, ToolDefinition,
};

const FUNCTION: &str = "function";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// A blank `request.model` is replaced by `fallback_model`.
    pub fn from_model_request(
        request: ModelRequest,
        fallback_model: &str,
        stream: bool,
    ) -> Result<Self, ProviderError> {
        let model = match request.model.trim() {
            "" => fallback_model.to_string(),
            model => model.to_string(),
        };

        let messages = request
            .messages
            .into_iter()
            .map(WireMessage::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        if messages.is_empty() {
            return Err(ProviderError::invalid_request(
                "chat completion requires at least one message",
            ));
        }

        let tools = request
            .tools
            .into_iter()
            .map(WireTool::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            model,
            messages,
            tools,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            stream,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl TryFrom<Message> for WireMessage {
    type Error = ProviderError;

    fn try_from(value: Message) -> Result<Self, Self::Error> {
        if value.role != Role::Assistant && value.content.trim().is_empty() {
            return Err(ProviderError::invalid_request(format!(
                "{} message content must not be empty",
                value.role.as_str()
            )));
        }
        if value.role == Role::Tool && value.tool_call_id.is_none() {
            return Err(ProviderError::invalid_request(
                "tool message requires a tool_call_id",
            ));
        }

        // A tool-requesting assistant turn with no text goes out as `content: null`.
        let content = match (value.content.is_empty(), value.tool_calls.is_empty()) {
            (true, false) => None,
            _ => Some(value.content),
        };

        Ok(Self {
            role: value.role.as_str(),
            content,
            tool_calls: value.tool_calls.into_iter().map(WireToolCall::from).collect(),
            tool_call_id: value.tool_call_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: WireFunctionCall,
}

fn function_kind() -> String {
    FUNCTION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    pub arguments: String,
}

impl From<ToolCall> for WireToolCall {
    fn from(value: ToolCall) -> Self {
        Self {
            id: value.id,
            kind: function_kind(),
            function: WireFunctionCall {
                name: value.name,
                arguments: value.arguments,
            },
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(value: WireToolCall) -> Self {
        Self {
            id: value.id,
            name: value.function.name,
            arguments: value.function.arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: WireFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl TryFrom<ToolDefinition> for WireTool {
    type Error = ProviderError;

    fn try_from(value: ToolDefinition) -> Result<Self, Self::Error> {
        let parameters = serde_json::from_str::<Value>(&value.input_schema).map_err(|err| {
            ProviderError::invalid_request(format!(
                "input schema for tool '{}' is not valid JSON: {err}",
                value.name
            ))
        })?;

        Ok(Self {
            kind: FUNCTION,
            function: WireFunction {
                name: value.name,
                description: value.description,
                parameters,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<WireUsage> for TokenUsage {
    fn from(value: WireUsage) -> Self {
        Self {
            input_tokens: value.prompt_tokens,
            output_tokens: value.completion_tokens,
            total_tokens: value.total_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatCompletion {
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionChoice {
    pub message: AssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<WireToolCall>,
}

impl ChatCompletion {
    /// Only the first choice is used; requests never ask for more than one.
    pub fn into_model_response(self) -> Result<ModelResponse, ProviderError> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            ProviderError::transport("chat completion response carried no choices")
        })?;

        let mut output = Vec::with_capacity(choice.message.tool_calls.len() + 1);
        if let Some(text) = choice.message.content.filter(|text| !text.is_empty()) {
            output.push(OutputItem::Message(Message::new(Role::Assistant, text)));
        }
        output.extend(
            choice
                .message
                .tool_calls
                .into_iter()
                .map(|call| OutputItem::ToolCall(call.into())),
        );

        Ok(ModelResponse {
            provider: ProviderId::OpenAi,
            model: self.model,
            output,
            stop_reason: stop_reason(choice.finish_reason.as_deref()),
            usage: self.usage.unwrap_or_default().into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallFragment>,
}

/// A slice of one tool call; fragments sharing an `index` concatenate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionFragment>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FunctionFragment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

pub fn stop_reason(finish_reason: Option<&str>) -> StopReason {
    match finish_reason {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
        Some("content_filter") => StopReason::Cancelled,
        _ => StopReason::Other,
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pulls `error.message` out of an API error body.
pub fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}
