//! Interactive market research agent: connects to a marketdesk tool registry,
//! binds its catalog to an OpenAI-backed reason-act loop, and keeps the
//! conversation under a session id.
//!
//! ```rust
//! use mdagent::{AgentConfig, StoreConfig, is_exit_command};
//!
//! let config = AgentConfig::from_lookup(|key| match key {
//!     "OPENAI_API_KEY" => Some("sk-example".to_string()),
//!     _ => None,
//! })
//! .expect("only the API key is required");
//!
//! assert_eq!(config.session_id, "conversation_1");
//! assert_eq!(config.store, StoreConfig::Memory);
//! assert!(is_exit_command("quit"));
//! ```

mod config;
mod runtime;
mod session;

pub use config::{AgentConfig, ConfigError, StoreConfig};
pub use runtime::{
    SetupError, SetupErrorKind, build_agent, build_provider, chat_service, connect_registry,
    open_store,
};
pub use session::{
    Agent, REPLY_PREFIX, SessionSummary, USER_PROMPT, is_exit_command, run_session,
};
