//! Retry with capped exponential backoff, and hooks observing each attempt.
//!
//! The policy only depends on the [`Retryable`] classification of an error,
//! so the remote tool runtime reuses it for registry calls.
//!
//! ```rust
//! use std::time::Duration;
//! use mdprovider::{ProviderError, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3);
//! assert!(policy.should_retry(1, &ProviderError::transport("connection reset")));
//! assert!(!policy.should_retry(3, &ProviderError::transport("connection reset")));
//! assert_eq!(policy.backoff_for_attempt(2), Duration::from_millis(400));
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::{ProviderError, ProviderId};

pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// `max_attempts` counts the first try; backoff before attempt `n + 1` is
/// `initial_backoff * backoff_multiplier^(n - 1)`, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Zero is treated as one attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1)
    }

    pub fn should_retry<E: Retryable + ?Sized>(&self, attempt: u32, error: &E) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let steps = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(steps);
        Duration::from_secs_f64(seconds.min(self.max_backoff.as_secs_f64()).max(0.0))
    }
}

/// One named operation against one provider, e.g. `openai.stream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCall {
    pub provider: ProviderId,
    pub operation: &'static str,
}

impl ProviderCall {
    pub fn new(provider: ProviderId, operation: &'static str) -> Self {
        Self {
            provider,
            operation,
        }
    }
}

impl fmt::Display for ProviderCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.provider, self.operation)
    }
}

pub trait ProviderOperationHooks: Send + Sync {
    fn on_attempt_started(&self, _call: ProviderCall, _attempt: u32) {}

    fn on_attempt_retrying(
        &self,
        _call: ProviderCall,
        _attempt: u32,
        _delay: Duration,
        _error: &ProviderError,
    ) {
    }

    fn on_call_succeeded(&self, _call: ProviderCall, _attempts: u32) {}

    fn on_call_failed(&self, _call: ProviderCall, _attempts: u32, _error: &ProviderError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationHooks;

impl ProviderOperationHooks for NoopOperationHooks {}

/// Runs `execute` until it succeeds, fails with a non-retryable error, or
/// exhausts the policy. `sleep` is injected so tests can skip real delays.
pub async fn execute_with_retry<T, Op, OpFuture, Sleep, SleepFuture>(
    call: ProviderCall,
    policy: &RetryPolicy,
    hooks: &dyn ProviderOperationHooks,
    mut execute: Op,
    mut sleep: Sleep,
) -> Result<T, ProviderError>
where
    Op: FnMut(u32) -> OpFuture,
    OpFuture: Future<Output = Result<T, ProviderError>>,
    Sleep: FnMut(Duration) -> SleepFuture,
    SleepFuture: Future<Output = ()>,
{
    for attempt in 1.. {
        hooks.on_attempt_started(call, attempt);

        let error = match execute(attempt).await {
            Ok(value) => {
                hooks.on_call_succeeded(call, attempt);
                return Ok(value);
            }
            Err(error) => error,
        };

        if !policy.should_retry(attempt, &error) {
            hooks.on_call_failed(call, attempt, &error);
            return Err(error);
        }

        let delay = policy.backoff_for_attempt(attempt);
        hooks.on_attempt_retrying(call, attempt, delay, &error);
        sleep(delay).await;
    }

    Err(ProviderError::other(format!("{call}: retry attempts overflowed")))
}
