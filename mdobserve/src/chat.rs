use std::time::Duration;

use mdchat::{ChatError, ChatTurnHooks, ChatTurnResult};
use mdcommon::SessionId;

use crate::{MetricsObservabilityHooks, Observers, TracingObservabilityHooks, millis};

impl ChatTurnHooks for TracingObservabilityHooks {
    fn on_turn_started(&self, session_id: &SessionId) {
        tracing::debug!(
            phase = "chat",
            event = "turn_started",
            session_id = %session_id,
            "chat turn started"
        );
    }

    fn on_turn_finished(&self, result: &ChatTurnResult, elapsed: Duration) {
        tracing::info!(
            phase = "chat",
            event = "turn_finished",
            session_id = %result.session_id,
            outcome = ?result.outcome,
            steps = result.steps,
            tool_calls = result.tool_executions.len(),
            total_tokens = result.usage.total_tokens,
            elapsed_ms = millis(elapsed),
            "chat turn finished"
        );
    }

    fn on_turn_failed(&self, session_id: &SessionId, error: &ChatError, elapsed: Duration) {
        tracing::error!(
            phase = "chat",
            event = "turn_failed",
            session_id = %session_id,
            error_kind = ?error.kind,
            error_phase = ?error.phase,
            user_error = error.is_user_error(),
            elapsed_ms = millis(elapsed),
            error = %error.message,
            "chat turn failed"
        );
    }
}

impl ChatTurnHooks for MetricsObservabilityHooks {
    fn on_turn_finished(&self, result: &ChatTurnResult, elapsed: Duration) {
        let outcome = if result.is_aborted() { "aborted" } else { "completed" };
        metrics::histogram!("marketdesk_chat_turn_steps", "outcome" => outcome)
            .record(f64::from(result.steps));
        metrics::histogram!("marketdesk_chat_turn_seconds", "outcome" => outcome)
            .record(elapsed.as_secs_f64());
    }

    fn on_turn_failed(&self, _session_id: &SessionId, _error: &ChatError, elapsed: Duration) {
        metrics::histogram!("marketdesk_chat_turn_seconds", "outcome" => "failed")
            .record(elapsed.as_secs_f64());
    }
}

impl<A, B> ChatTurnHooks for Observers<A, B>
where
    A: ChatTurnHooks,
    B: ChatTurnHooks,
{
    fn on_turn_started(&self, session_id: &SessionId) {
        self.0.on_turn_started(session_id);
        self.1.on_turn_started(session_id);
    }

    fn on_turn_finished(&self, result: &ChatTurnResult, elapsed: Duration) {
        self.0.on_turn_finished(result, elapsed);
        self.1.on_turn_finished(result, elapsed);
    }

    fn on_turn_failed(&self, session_id: &SessionId, error: &ChatError, elapsed: Duration) {
        self.0.on_turn_failed(session_id, error, elapsed);
        self.1.on_turn_failed(session_id, error, elapsed);
    }
}
