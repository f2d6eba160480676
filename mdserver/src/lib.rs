//! Financial-data and web-search tool registry.
//!
//! The registry publishes seven tools and two prompt templates over JSON-RPC
//! (`POST /mcp`). Upstream access goes through the [`market`] and [`search`]
//! traits, so every tool can be exercised against fakes.
//!
//! ```rust
//! use mdserver::prompts::PromptCatalog;
//!
//! let names = PromptCatalog::default()
//!     .descriptors()
//!     .into_iter()
//!     .map(|prompt| prompt.name)
//!     .collect::<Vec<_>>();
//! assert_eq!(names, vec!["stock_summary_prompt", "investment_thesis_prompt"]);
//! ```

pub mod config;
mod error;
pub mod market;
pub mod prompts;
pub mod search;
pub mod tools;
pub mod transport;

pub use config::{ConfigError, ServerConfig};
pub use error::{SourceError, SourceErrorKind};
pub use tools::{DataSources, ToolReply, build_registry};
pub use transport::{RegistryState, router, serve};
