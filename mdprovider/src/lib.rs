//! Model provider layer: provider-agnostic request and response types, the
//! [`ModelProvider`] contract, streaming events, credentials, and retry policy.
//!
//! ```rust
//! use mdprovider::{Message, ModelRequest, Role};
//!
//! let request = ModelRequest::new("gpt-4.1-mini", vec![Message::new(Role::User, "Summarize AAPL")])
//!     .with_temperature(0.0);
//! assert!(request.validate().is_ok());
//! ```

pub mod adapters;
pub mod credentials;
pub mod error;
pub mod model;
pub mod provider;
pub mod resilience;
pub mod stream;

pub use credentials::{SecretString, SecureCredentialManager};
pub use error::{ProviderError, ProviderErrorKind};
pub use model::{
    Message, ModelRequest, ModelResponse, OutputItem, ProviderId, Role,
    StopReason, TokenUsage, ToolCall, ToolDefinition, ToolResult,
};
pub use provider::{ModelProvider, ProviderFuture};
pub use resilience::{
    NoopOperationHooks, ProviderCall, ProviderOperationHooks, RetryPolicy, Retryable,
    execute_with_retry,
};
pub use stream::{BoxedEventStream, ReplayEventStream, StreamEvent};
