use std::time::Duration;

use mdprovider::ToolCall;
use mdtooling::{ToolError, ToolExecutionContext, ToolExecutionResult, ToolRuntimeHooks};

use crate::{MetricsObservabilityHooks, Observers, TracingObservabilityHooks, millis};

fn trace_id(context: &ToolExecutionContext) -> Option<&str> {
    context.trace_id.as_ref().map(|id| id.as_str())
}

impl ToolRuntimeHooks for TracingObservabilityHooks {
    fn on_call_started(&self, call: &ToolCall, context: &ToolExecutionContext) {
        tracing::info!(
            phase = "tool",
            event = "call_started",
            tool_name = %call.name,
            tool_call_id = %call.id,
            session_id = %context.session_id,
            trace_id = trace_id(context),
            "tool call started"
        );
    }

    fn on_call_completed(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
        result: &ToolExecutionResult,
        elapsed: Duration,
    ) {
        if result.is_error() {
            tracing::warn!(
                phase = "tool",
                event = "call_contained_error",
                tool_name = %call.name,
                tool_call_id = %call.id,
                session_id = %context.session_id,
                elapsed_ms = millis(elapsed),
                output = %result.output.render(),
                "tool returned an error mapping"
            );
        } else {
            tracing::info!(
                phase = "tool",
                event = "call_completed",
                tool_name = %call.name,
                tool_call_id = %call.id,
                session_id = %context.session_id,
                trace_id = trace_id(context),
                elapsed_ms = millis(elapsed),
                "tool call completed"
            );
        }
    }

    fn on_call_failed(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        tracing::error!(
            phase = "tool",
            event = "call_failed",
            tool_name = %call.name,
            tool_call_id = %call.id,
            session_id = %context.session_id,
            trace_id = trace_id(context),
            elapsed_ms = millis(elapsed),
            error_kind = error.kind.as_str(),
            retryable = error.retryable,
            error = %error.message,
            "tool call failed"
        );
    }

    fn on_call_retry(&self, call: &ToolCall, attempt: u32, delay: Duration, error: &ToolError) {
        tracing::warn!(
            phase = "tool",
            event = "call_retry",
            tool_name = %call.name,
            tool_call_id = %call.id,
            attempt,
            delay_ms = millis(delay),
            error_kind = error.kind.as_str(),
            "tool call will be resent"
        );
    }
}

impl ToolRuntimeHooks for MetricsObservabilityHooks {
    fn on_call_started(&self, call: &ToolCall, _context: &ToolExecutionContext) {
        metrics::counter!("marketdesk_tool_calls_started_total", "tool_name" => call.name.clone())
            .increment(1);
    }

    fn on_call_completed(
        &self,
        call: &ToolCall,
        _context: &ToolExecutionContext,
        result: &ToolExecutionResult,
        elapsed: Duration,
    ) {
        let outcome = if result.is_error() { "error_output" } else { "ok" };
        metrics::histogram!(
            "marketdesk_tool_call_duration_seconds",
            "tool_name" => call.name.clone(),
            "outcome" => outcome
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_call_failed(
        &self,
        call: &ToolCall,
        _context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        metrics::histogram!(
            "marketdesk_tool_call_duration_seconds",
            "tool_name" => call.name.clone(),
            "outcome" => error.kind.as_str()
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_call_retry(&self, call: &ToolCall, _attempt: u32, _delay: Duration, error: &ToolError) {
        metrics::counter!(
            "marketdesk_tool_call_retries_total",
            "tool_name" => call.name.clone(),
            "error_kind" => error.kind.as_str()
        )
        .increment(1);
    }
}

impl<A, B> ToolRuntimeHooks for Observers<A, B>
where
    A: ToolRuntimeHooks,
    B: ToolRuntimeHooks,
{
    fn on_call_started(&self, call: &ToolCall, context: &ToolExecutionContext) {
        self.0.on_call_started(call, context);
        self.1.on_call_started(call, context);
    }

    fn on_call_completed(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
        result: &ToolExecutionResult,
        elapsed: Duration,
    ) {
        self.0.on_call_completed(call, context, result, elapsed);
        self.1.on_call_completed(call, context, result, elapsed);
    }

    fn on_call_failed(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        self.0.on_call_failed(call, context, error, elapsed);
        self.1.on_call_failed(call, context, error, elapsed);
    }

    fn on_call_retry(&self, call: &ToolCall, attempt: u32, delay: Duration, error: &ToolError) {
        self.0.on_call_retry(call, attempt, delay, error);
        self.1.on_call_retry(call, attempt, delay, error);
    }
}
