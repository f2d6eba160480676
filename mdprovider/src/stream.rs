//! Streaming event contract plus a replaying stream for fakes.
//!
//! A provider stream yields events in arrival order: any number of
//! `TextDelta` and `ToolCallDelta` items, then at most one
//! `ResponseComplete` carrying the assembled response. Nothing follows it.
//!
//! ```rust
//! use mdprovider::{BoxedEventStream, ReplayEventStream, StreamEvent};
//!
//! let stream = ReplayEventStream::new(vec![Ok(StreamEvent::TextDelta("AAPL closed".into()))]);
//! let _boxed: BoxedEventStream<'static> = Box::pin(stream);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::{ModelResponse, OutputItem, ProviderError, ToolCall};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    /// A tool call whose arguments are fully assembled.
    ToolCallDelta(ToolCall),
    ResponseComplete(ModelResponse),
}

pub type BoxedEventStream<'a> =
    Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send + 'a>>;

/// Yields a prepared list of events, then ends.
#[derive(Debug, Default)]
pub struct ReplayEventStream {
    pending: VecDeque<Result<StreamEvent, ProviderError>>,
}

impl ReplayEventStream {
    pub fn new(events: Vec<Result<StreamEvent, ProviderError>>) -> Self {
        Self {
            pending: events.into(),
        }
    }

    /// The events a live stream would have produced for `response`.
    pub fn from_response(response: ModelResponse) -> Self {
        let deltas = response.output.iter().filter_map(|item| match item {
            OutputItem::Message(message) if message.content.is_empty() => None,
            OutputItem::Message(message) => Some(StreamEvent::TextDelta(message.content.clone())),
            OutputItem::ToolCall(call) => Some(StreamEvent::ToolCallDelta(call.clone())),
        });

        let mut pending = deltas.map(Ok).collect::<VecDeque<_>>();
        pending.push_back(Ok(StreamEvent::ResponseComplete(response)));
        Self { pending }
    }
}

impl Stream for ReplayEventStream {
    type Item = Result<StreamEvent, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.pending.pop_front())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), Some(self.pending.len()))
    }
}
