//! Server-sent event framing and chunk accumulation for streamed completions.

use std::collections::BTreeMap;

use crate::{
    Message, ModelResponse, OutputItem, ProviderError, ProviderId, Role, StopReason, StreamEvent,
    TokenUsage, ToolCall,
};

use super::wire::{ChatCompletionChunk, stop_reason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseFrame {
    Data(String),
    Done,
}

/// Buffers raw bytes until whole lines arrive, so multi-byte characters may
/// straddle network chunks.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseFrame>, ProviderError> {
        self.pending.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(end) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line = self.pending.drain(..=end).collect::<Vec<_>>();
            let line = std::str::from_utf8(&line)
                .map_err(|err| ProviderError::transport(format!("stream is not UTF-8: {err}")))?
                .trim();

            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            match payload.trim() {
                "[DONE]" => frames.push(SseFrame::Done),
                "" => {}
                data => frames.push(SseFrame::Data(data.to_string())),
            }
        }

        Ok(frames)
    }
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Folds streamed chunks into the response a non-streamed call would return.
#[derive(Debug)]
pub(crate) struct ChunkAccumulator {
    model: String,
    text: String,
    calls: BTreeMap<u32, PartialCall>,
    stop_reason: StopReason,
    usage: TokenUsage,
}

impl ChunkAccumulator {
    pub(crate) fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            text: String::new(),
            calls: BTreeMap::new(),
            stop_reason: StopReason::Other,
            usage: TokenUsage::default(),
        }
    }

    /// Returns the text deltas carried by `chunk`.
    pub(crate) fn apply(&mut self, chunk: ChatCompletionChunk) -> Vec<StreamEvent> {
        if let Some(model) = chunk.model.filter(|model| !model.is_empty()) {
            self.model = model;
        }
        if let Some(usage) = chunk.usage {
            self.usage = usage.into();
        }

        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
                self.text.push_str(&text);
                events.push(StreamEvent::TextDelta(text));
            }

            for fragment in choice.delta.tool_calls {
                let call = self.calls.entry(fragment.index).or_default();
                if let Some(id) = fragment.id {
                    call.id = Some(id);
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        call.name = name;
                    }
                    if let Some(arguments) = function.arguments {
                        call.arguments.push_str(&arguments);
                    }
                }
            }

            if choice.finish_reason.is_some() {
                self.stop_reason = stop_reason(choice.finish_reason.as_deref());
            }
        }

        events
    }

    /// One `ToolCallDelta` per assembled call, then the complete response.
    pub(crate) fn finish(self) -> Vec<StreamEvent> {
        let calls = self
            .calls
            .into_iter()
            .map(|(index, call)| ToolCall {
                id: call.id.unwrap_or_else(|| format!("call_{index}")),
                name: call.name,
                arguments: call.arguments,
            })
            .collect::<Vec<_>>();

        let mut output = Vec::with_capacity(calls.len() + 1);
        if !self.text.is_empty() {
            output.push(OutputItem::Message(Message::new(Role::Assistant, self.text)));
        }
        output.extend(calls.iter().cloned().map(OutputItem::ToolCall));

        let mut events = calls
            .into_iter()
            .map(StreamEvent::ToolCallDelta)
            .collect::<Vec<_>>();
        events.push(StreamEvent::ResponseComplete(ModelResponse {
            provider: ProviderId::OpenAi,
            model: self.model,
            output,
            stop_reason: self.stop_reason,
            usage: self.usage,
        }));
        events
    }
}
