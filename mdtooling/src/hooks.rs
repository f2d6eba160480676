//! Observation points around each tool call a runtime executes.
//!
//! ```rust
//! use mdtooling::{NoopToolRuntimeHooks, ToolRuntimeHooks};
//!
//! fn observe(_hooks: &dyn ToolRuntimeHooks) {}
//!
//! observe(&NoopToolRuntimeHooks);
//! ```

use std::time::Duration;

use mdprovider::ToolCall;

use crate::{ToolError, ToolExecutionContext, ToolExecutionResult};

/// Every method defaults to doing nothing. Implementations must not block.
pub trait ToolRuntimeHooks: Send + Sync {
    fn on_call_started(&self, _call: &ToolCall, _context: &ToolExecutionContext) {}

    /// Fires for contained `{error}` outputs too; check `result.is_error()`.
    fn on_call_completed(
        &self,
        _call: &ToolCall,
        _context: &ToolExecutionContext,
        _result: &ToolExecutionResult,
        _elapsed: Duration,
    ) {
    }

    fn on_call_failed(
        &self,
        _call: &ToolCall,
        _context: &ToolExecutionContext,
        _error: &ToolError,
        _elapsed: Duration,
    ) {
    }

    /// A remote call failed with a retryable error and will be resent after `delay`.
    fn on_call_retry(&self, _call: &ToolCall, _attempt: u32, _delay: Duration, _error: &ToolError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopToolRuntimeHooks;

impl ToolRuntimeHooks for NoopToolRuntimeHooks {}
