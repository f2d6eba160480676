//! Agent-side conversation orchestration: the reason-act turn loop over a
//! model provider, a tool runtime, and a session store.
//!
//! ```rust
//! use mdchat::{ChatPolicy, ChatSession, ChatTurnRequest, TurnState};
//!
//! let session = ChatSession::new("conversation_1", "gpt-4.1-mini")
//!     .with_system_prompt("You are a market research assistant.");
//! let request = ChatTurnRequest::new(session, "How did NVDA close?").with_temperature(0.0);
//!
//! assert_eq!(ChatPolicy::default().max_steps, 8);
//! assert_eq!(request.options.temperature, Some(0.0));
//! assert!(!TurnState::AwaitingModel.is_terminal());
//! ```

mod error;
mod hooks;
mod service;
mod store;
mod types;

pub mod prelude {
    pub use crate::{
        ChatError, ChatErrorKind, ChatErrorPhase, ChatEvent, ChatEventStream, ChatPolicy,
        ChatService, ChatServiceBuilder, ChatSession, ChatTurnRequest, ChatTurnResult,
        ConversationStore, InMemoryConversationStore, TurnOutcome,
    };
    pub use mdcommon::{SessionId, TraceId};
    pub use mdtooling::{ToolExecutionResult, ToolRuntime};
}

pub use error::{ChatError, ChatErrorKind, ChatErrorPhase, ChatErrorSource};
pub use hooks::{ChatTurnHooks, NoopChatTurnHooks};
pub use service::{
    ChatPolicy, ChatService, ChatServiceBuilder, DEFAULT_MAX_STEPS, step_budget_message,
};
pub use store::{ChatFuture, ConversationStore, InMemoryConversationStore};
pub use types::{
    ChatEvent, ChatEventStream, ChatSession, ChatTurnRequest, ChatTurnResult, TurnOutcome,
    TurnState,
};
pub use mdcommon::{SessionId, TraceId};
