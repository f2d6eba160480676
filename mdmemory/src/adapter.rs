use std::sync::Arc;

use mdchat::{ChatError, ChatFuture, ConversationStore};
use mdcommon::SessionId;
use mdprovider::Message;

use crate::backend::TranscriptBackend;
use crate::error::MemoryError;

/// Lets the chat service persist turns through any [`TranscriptBackend`].
#[derive(Clone)]
pub struct TranscriptStore {
    backend: Arc<dyn TranscriptBackend>,
}

impl TranscriptStore {
    pub fn new(backend: Arc<dyn TranscriptBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn TranscriptBackend> {
        &self.backend
    }
}

impl From<MemoryError> for ChatError {
    fn from(value: MemoryError) -> Self {
        ChatError::store(value.to_string())
    }
}

impl ConversationStore for TranscriptStore {
    fn load_messages<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Vec<Message>, ChatError>> {
        Box::pin(async move { Ok(self.backend.load(session_id).await?) })
    }

    fn append_messages<'a>(
        &'a self,
        session_id: &'a SessionId,
        messages: Vec<Message>,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move { Ok(self.backend.append(session_id, messages).await?) })
    }
}
