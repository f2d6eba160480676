use std::time::Duration;

use mdprovider::{ProviderCall, ProviderError, ProviderOperationHooks};

use crate::{MetricsObservabilityHooks, Observers, TracingObservabilityHooks, millis};

impl ProviderOperationHooks for TracingObservabilityHooks {
    fn on_attempt_started(&self, call: ProviderCall, attempt: u32) {
        tracing::debug!(
            phase = "provider",
            event = "attempt_started",
            provider = %call.provider,
            operation = call.operation,
            attempt,
            "model request sent"
        );
    }

    fn on_attempt_retrying(
        &self,
        call: ProviderCall,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        tracing::warn!(
            phase = "provider",
            event = "attempt_retrying",
            provider = %call.provider,
            operation = call.operation,
            attempt,
            delay_ms = millis(delay),
            error_kind = error.kind.as_str(),
            error = %error.message,
            "model request failed; backing off"
        );
    }

    fn on_call_succeeded(&self, call: ProviderCall, attempts: u32) {
        tracing::info!(
            phase = "provider",
            event = "call_succeeded",
            provider = %call.provider,
            operation = call.operation,
            attempts,
            "model request succeeded"
        );
    }

    fn on_call_failed(&self, call: ProviderCall, attempts: u32, error: &ProviderError) {
        tracing::error!(
            phase = "provider",
            event = "call_failed",
            provider = %call.provider,
            operation = call.operation,
            attempts,
            error_kind = error.kind.as_str(),
            retryable = error.retryable,
            error = %error.message,
            "model request failed"
        );
    }
}

impl ProviderOperationHooks for MetricsObservabilityHooks {
    fn on_attempt_started(&self, call: ProviderCall, _attempt: u32) {
        metrics::counter!(
            "marketdesk_provider_attempts_total",
            "provider" => call.provider.to_string(),
            "operation" => call.operation
        )
        .increment(1);
    }

    fn on_attempt_retrying(
        &self,
        call: ProviderCall,
        _attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        metrics::histogram!(
            "marketdesk_provider_backoff_seconds",
            "provider" => call.provider.to_string(),
            "operation" => call.operation,
            "error_kind" => error.kind.as_str()
        )
        .record(delay.as_secs_f64());
    }

    fn on_call_succeeded(&self, call: ProviderCall, attempts: u32) {
        metrics::histogram!(
            "marketdesk_provider_attempts_per_call",
            "provider" => call.provider.to_string(),
            "operation" => call.operation,
            "outcome" => "ok"
        )
        .record(f64::from(attempts));
    }

    fn on_call_failed(&self, call: ProviderCall, attempts: u32, error: &ProviderError) {
        metrics::histogram!(
            "marketdesk_provider_attempts_per_call",
            "provider" => call.provider.to_string(),
            "operation" => call.operation,
            "outcome" => error.kind.as_str()
        )
        .record(f64::from(attempts));
    }
}

impl<A, B> ProviderOperationHooks for Observers<A, B>
where
    A: ProviderOperationHooks,
    B: ProviderOperationHooks,
{
    fn on_attempt_started(&self, call: ProviderCall, attempt: u32) {
        self.0.on_attempt_started(call, attempt);
        self.1.on_attempt_started(call, attempt);
    }

    fn on_attempt_retrying(
        &self,
        call: ProviderCall,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        self.0.on_attempt_retrying(call, attempt, delay, error);
        self.1.on_attempt_retrying(call, attempt, delay, error);
    }

    fn on_call_succeeded(&self, call: ProviderCall, attempts: u32) {
        self.0.on_call_succeeded(call, attempts);
        self.1.on_call_succeeded(call, attempts);
    }

    fn on_call_failed(&self, call: ProviderCall, attempts: u32, error: &ProviderError) {
        self.0.on_call_failed(call, attempts, error);
        self.1.on_call_failed(call, attempts, error);
    }
}
