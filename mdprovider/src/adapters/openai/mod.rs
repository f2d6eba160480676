//! OpenAI Chat Completions adapter.

mod provider;
mod sse;
mod transport;
pub mod wire;

pub use provider::{DEFAULT_MODEL, OpenAiProvider};
pub use transport::{ChunkStream, DEFAULT_BASE_URL, OpenAiHttpTransport, OpenAiTransport};
pub use wire::{ChatCompletion, ChatCompletionChunk, ChatCompletionRequest};
