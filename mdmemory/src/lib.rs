//! Session transcript storage for the marketdesk agent.
//!
//! A [`TranscriptBackend`] keeps messages per session; [`TranscriptStore`]
//! plugs one into the chat service as its `ConversationStore`.
//!
//! ```rust
//! use mdmemory::{BackendConfig, TranscriptStore, open_backend};
//!
//! let backend = open_backend(BackendConfig::Volatile).expect("volatile backend opens");
//! let _store = TranscriptStore::new(backend);
//! ```

mod adapter;
mod backend;
mod error;
mod sqlite;

pub use adapter::TranscriptStore;
pub use backend::{BackendConfig, TranscriptBackend, VolatileBackend, open_backend};
pub use error::{MemoryError, MemoryErrorKind};
pub use sqlite::SqliteBackend;
