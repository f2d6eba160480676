//! Lifecycle hooks for chat turns.
//!
//! ```rust
//! use mdchat::{ChatTurnHooks, NoopChatTurnHooks};
//!
//! fn assert_hooks_trait(_hooks: &dyn ChatTurnHooks) {}
//!
//! assert_hooks_trait(&NoopChatTurnHooks);
//! ```

use std::time::Duration;

use mdcommon::SessionId;

use crate::{ChatError, ChatTurnResult};

pub trait ChatTurnHooks: Send + Sync {
    fn on_turn_started(&self, _session_id: &SessionId) {}

    /// Called for completed and aborted turns alike.
    fn on_turn_finished(&self, _result: &ChatTurnResult, _elapsed: Duration) {}

    fn on_turn_failed(&self, _session_id: &SessionId, _error: &ChatError, _elapsed: Duration) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatTurnHooks;

impl ChatTurnHooks for NoopChatTurnHooks {}
