//! Wrappers that contain panics raised inside a hook.
//!
//! A hook runs inline with the provider call, tool call, or chat turn it
//! observes; the wrappers make sure a broken sink costs one lost event and
//! nothing more.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use mdchat::{ChatError, ChatTurnHooks, ChatTurnResult};
use mdcommon::SessionId;
use mdprovider::{ProviderCall, ProviderError, ProviderOperationHooks, ToolCall};
use mdtooling::{ToolError, ToolExecutionContext, ToolExecutionResult, ToolRuntimeHooks};

fn shielded(callback: &'static str, hook: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(hook)).is_err() {
        tracing::warn!(
            phase = "observe",
            event = "hook_panicked",
            callback,
            "observability hook panicked; event dropped"
        );
    }
}

macro_rules! safe_wrapper {
    ($name:ident) => {
        #[derive(Debug, Clone, Default)]
        pub struct $name<H> {
            inner: H,
        }

        impl<H> $name<H> {
            pub fn new(inner: H) -> Self {
                Self { inner }
            }

            pub fn into_inner(self) -> H {
                self.inner
            }
        }
    };
}

safe_wrapper!(SafeProviderHooks);
safe_wrapper!(SafeToolHooks);
safe_wrapper!(SafeChatHooks);

impl<H: ProviderOperationHooks> ProviderOperationHooks for SafeProviderHooks<H> {
    fn on_attempt_started(&self, call: ProviderCall, attempt: u32) {
        shielded("on_attempt_started", || {
            self.inner.on_attempt_started(call, attempt)
        });
    }

    fn on_attempt_retrying(
        &self,
        call: ProviderCall,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        shielded("on_attempt_retrying", || {
            self.inner.on_attempt_retrying(call, attempt, delay, error)
        });
    }

    fn on_call_succeeded(&self, call: ProviderCall, attempts: u32) {
        shielded("on_call_succeeded", || {
            self.inner.on_call_succeeded(call, attempts)
        });
    }

    fn on_call_failed(&self, call: ProviderCall, attempts: u32, error: &ProviderError) {
        shielded("on_call_failed", || {
            self.inner.on_call_failed(call, attempts, error)
        });
    }
}

impl<H: ToolRuntimeHooks> ToolRuntimeHooks for SafeToolHooks<H> {
    fn on_call_started(&self, call: &ToolCall, context: &ToolExecutionContext) {
        shielded("on_call_started", || self.inner.on_call_started(call, context));
    }

    fn on_call_completed(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
        result: &ToolExecutionResult,
        elapsed: Duration,
    ) {
        shielded("on_call_completed", || {
            self.inner.on_call_completed(call, context, result, elapsed)
        });
    }

    fn on_call_failed(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        shielded("on_call_failed", || {
            self.inner.on_call_failed(call, context, error, elapsed)
        });
    }

    fn on_call_retry(&self, call: &ToolCall, attempt: u32, delay: Duration, error: &ToolError) {
        shielded("on_call_retry", || {
            self.inner.on_call_retry(call, attempt, delay, error)
        });
    }
}

impl<H: ChatTurnHooks> ChatTurnHooks for SafeChatHooks<H> {
    fn on_turn_started(&self, session_id: &SessionId) {
        shielded("on_turn_started", || self.inner.on_turn_started(session_id));
    }

    fn on_turn_finished(&self, result: &ChatTurnResult, elapsed: Duration) {
        shielded("on_turn_finished", || {
            self.inner.on_turn_finished(result, elapsed)
        });
    }

    fn on_turn_failed(&self, session_id: &SessionId, error: &ChatError, elapsed: Duration) {
        shielded("on_turn_failed", || {
            self.inner.on_turn_failed(session_id, error, elapsed)
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use mdchat::TurnOutcome;
    use mdprovider::{ProviderId, StopReason, TokenUsage};
    use mdtooling::ToolOutput;

    use super::*;
    use crate::{MetricsObservabilityHooks, Observers, TracingObservabilityHooks};

    fn quote_call() -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: "stock_summary".to_string(),
            arguments: "{\"ticker\":\"AAPL\"}".to_string(),
        }
    }

    fn context() -> ToolExecutionContext {
        ToolExecutionContext::new("conversation_1").with_trace_id("turn-1")
    }

    fn finished_turn(outcome: TurnOutcome) -> ChatTurnResult {
        ChatTurnResult {
            session_id: SessionId::from("conversation_1"),
            assistant_message: "AAPL closed at $189.84.".to_string(),
            outcome,
            tool_executions: vec![ToolExecutionResult::from_call(
                &quote_call(),
                ToolOutput::success("AAPL Summary:\n"),
            )],
            steps: 2,
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    const COMPLETE: ProviderCall = ProviderCall {
        provider: ProviderId::OpenAi,
        operation: "complete",
    };

    fn drive_every_callback<H>(hooks: &H)
    where
        H: ProviderOperationHooks + ToolRuntimeHooks + ChatTurnHooks,
    {
        let provider_error = ProviderError::timeout("deadline exceeded");
        hooks.on_attempt_started(COMPLETE, 1);
        hooks.on_attempt_retrying(COMPLETE, 1, Duration::from_millis(200), &provider_error);
        hooks.on_call_succeeded(COMPLETE, 2);
        ProviderOperationHooks::on_call_failed(hooks, COMPLETE, 3, &provider_error);

        let tool_error = ToolError::transport("registry unreachable");
        let elapsed = Duration::from_millis(12);
        hooks.on_call_started(&quote_call(), &context());
        for output in [ToolOutput::success("ok"), ToolOutput::failure("HTTP 404")] {
            let result = ToolExecutionResult::from_call(&quote_call(), output);
            hooks.on_call_completed(&quote_call(), &context(), &result, elapsed);
        }
        ToolRuntimeHooks::on_call_failed(hooks, &quote_call(), &context(), &tool_error, elapsed);
        hooks.on_call_retry(&quote_call(), 1, Duration::from_millis(200), &tool_error);

        let session_id = SessionId::from("conversation_1");
        hooks.on_turn_started(&session_id);
        hooks.on_turn_finished(&finished_turn(TurnOutcome::Completed), elapsed);
        hooks.on_turn_finished(&finished_turn(TurnOutcome::Aborted), elapsed);
        hooks.on_turn_failed(&session_id, &ChatError::from(tool_error), elapsed);
    }

    #[test]
    fn both_sinks_accept_every_callback_without_a_subscriber_or_recorder() {
        drive_every_callback(&Observers(TracingObservabilityHooks, MetricsObservabilityHooks));
    }

    /// Panics on every callback after noting its name.
    #[derive(Default)]
    struct Exploding(Mutex<Vec<&'static str>>);

    impl Exploding {
        fn note(&self, callback: &'static str) -> ! {
            self.0.lock().expect("notes lock").push(callback);
            panic!("{callback} exploded");
        }
    }

    impl ProviderOperationHooks for Exploding {
        fn on_attempt_started(&self, _call: ProviderCall, _attempt: u32) {
            self.note("provider");
        }
    }

    impl ToolRuntimeHooks for Exploding {
        fn on_call_started(&self, _call: &ToolCall, _context: &ToolExecutionContext) {
            self.note("tool");
        }
    }

    impl ChatTurnHooks for Exploding {
        fn on_turn_started(&self, _session_id: &SessionId) {
            self.note("chat");
        }
    }

    #[test]
    fn wrappers_swallow_panics_from_the_inner_sink() {
        let provider = SafeProviderHooks::new(Exploding::default());
        provider.on_attempt_started(COMPLETE, 1);

        let tools = SafeToolHooks::new(Exploding::default());
        tools.on_call_started(&quote_call(), &context());

        let chat = SafeChatHooks::new(Exploding::default());
        chat.on_turn_started(&SessionId::from("conversation_1"));

        let notes = [provider.into_inner(), tools.into_inner(), chat.into_inner()]
            .map(|hooks| hooks.0.into_inner().expect("notes lock"));
        assert_eq!(notes, [vec!["provider"], vec!["tool"], vec!["chat"]]);
    }

    #[test]
    fn observers_call_the_first_sink_before_the_second() {
        struct Named(&'static str, std::sync::Arc<Mutex<Vec<&'static str>>>);

        impl ChatTurnHooks for Named {
            fn on_turn_started(&self, _session_id: &SessionId) {
                self.1.lock().expect("order lock").push(self.0);
            }
        }

        let order = std::sync::Arc::new(Mutex::new(Vec::new()));
        let pair = Observers(Named("tracing", order.clone()), Named("metrics", order.clone()));
        pair.on_turn_started(&SessionId::from("conversation_1"));

        assert_eq!(*order.lock().expect("order lock"), vec!["tracing", "metrics"]);
    }
}
