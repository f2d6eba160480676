//! Turns provider, tool, and chat-turn hook callbacks into `tracing` events
//! and `metrics` series.
//!
//! Each layer's hook trait is implemented by [`TracingObservabilityHooks`]
//! and [`MetricsObservabilityHooks`]. [`Observers`] runs two sinks side by
//! side, and the `Safe*` wrappers keep a panicking sink from unwinding into
//! the call it observes.
//!
//! ```rust
//! use mdobserve::{MetricsObservabilityHooks, Observers, SafeToolHooks, TracingObservabilityHooks};
//!
//! let _hooks = SafeToolHooks::new(Observers(
//!     TracingObservabilityHooks,
//!     MetricsObservabilityHooks,
//! ));
//! ```

mod chat;
mod guard;
mod provider;
mod tools;

use std::time::Duration;

pub use guard::{SafeChatHooks, SafeProviderHooks, SafeToolHooks};

/// Emits one structured `tracing` event per callback, tagged with `phase`
/// (`provider`, `tool`, `chat`) and `event`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

/// Records counters and histograms under the `marketdesk_` prefix. Without
/// an installed recorder the calls are no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

/// Forwards every callback to both sinks, first `.0` then `.1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Observers<A, B>(pub A, pub B);

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
