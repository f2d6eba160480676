//! What a tool call runs with and what it hands back.

use mdcommon::{SessionId, TraceId};
use mdprovider::{Message, ToolCall, ToolResult};
use serde_json::{Value, json};

/// Ambient identity of the conversation a call belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecutionContext {
    pub session_id: SessionId,
    pub trace_id: Option<TraceId>,
}

impl ToolExecutionContext {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            trace_id: None,
        }
    }

    pub fn with_trace_id(self, trace_id: impl Into<TraceId>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
            ..self
        }
    }
}

/// Value produced by one tool invocation.
///
/// An `is_error` output is a contained fault: `value` is the `{"error": ..}`
/// mapping and stands in for the tool's declared return value.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub value: Value,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            is_error: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            value: json!({ "error": message.into() }),
            is_error: true,
        }
    }

    /// Text handed to the model. Strings pass through untouched so report
    /// formatting survives; anything else is compact JSON.
    pub fn render(&self) -> String {
        self.value
            .as_str()
            .map_or_else(|| self.value.to_string(), str::to_owned)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: ToolOutput,
}

impl ToolExecutionResult {
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: ToolOutput,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            output,
        }
    }

    pub fn from_call(call: &ToolCall, output: ToolOutput) -> Self {
        Self::new(&call.id, &call.name, output)
    }

    pub fn is_error(&self) -> bool {
        self.output.is_error
    }

    pub fn into_tool_result(self) -> ToolResult {
        let output = self.output.render();
        ToolResult {
            tool_call_id: self.tool_call_id,
            output,
        }
    }

    /// The `tool` role turn answering the originating call.
    pub fn into_message(self) -> Message {
        self.into_tool_result().into()
    }
}
