//! Vocabulary shared by every marketdesk crate: session and trace keys, the
//! boxed future alias used by object-safe async traits, and sampling options.
//!
//! ```rust
//! use mdcommon::{GenerationOptions, SessionId, TraceId};
//!
//! let session = SessionId::from("conversation_1");
//! let trace: TraceId = "turn-7".into();
//! let options = GenerationOptions::default().with_temperature(0.0);
//!
//! assert_eq!(session.as_str(), "conversation_1");
//! assert_eq!(format!("{session}/{trace}"), "conversation_1/turn-7");
//! assert_eq!(options.temperature, Some(0.0));
//! ```

mod ids;
mod options;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

pub use ids::{SessionId, TraceId};
pub use options::GenerationOptions;

/// Output of an async trait method that must stay object safe.
///
/// ```rust
/// use mdcommon::BoxFuture;
///
/// fn quote_len<'a>(ticker: &'a str) -> BoxFuture<'a, usize> {
///     Box::pin(async move { ticker.len() })
/// }
///
/// let _pending = quote_len("MSFT");
/// ```
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Free-form string annotations threaded through requests for logging.
pub type MetadataMap = HashMap<String, String>;
