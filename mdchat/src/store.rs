//! Where finished turns are kept between requests.
//!
//! ```rust
//! use mdchat::{ConversationStore, InMemoryConversationStore, SessionId};
//! use mdprovider::{Message, Role};
//!
//! let runtime = tokio::runtime::Runtime::new().expect("runtime");
//! let store = InMemoryConversationStore::new();
//! let session = SessionId::from("conversation_1");
//!
//! runtime.block_on(async {
//!     store
//!         .append_messages(&session, vec![Message::new(Role::User, "Hi")])
//!         .await
//!         .expect("append");
//!     assert_eq!(store.load_messages(&session).await.expect("load").len(), 1);
//! });
//! ```

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use mdcommon::{BoxFuture, SessionId};
use mdprovider::Message;

use crate::ChatError;

pub type ChatFuture<'a, T> = BoxFuture<'a, T>;

/// Ordered, append-only message history per session.
///
/// Loading a session that was never written yields an empty history.
pub trait ConversationStore: Send + Sync {
    fn load_messages<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Vec<Message>, ChatError>>;

    fn append_messages<'a>(
        &'a self,
        session_id: &'a SessionId,
        messages: Vec<Message>,
    ) -> ChatFuture<'a, Result<(), ChatError>>;
}

/// Process-local store; history is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    histories: RwLock<BTreeMap<SessionId, Vec<Message>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> ChatError {
    ChatError::store("conversation history lock poisoned")
}

impl ConversationStore for InMemoryConversationStore {
    fn load_messages<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Vec<Message>, ChatError>> {
        Box::pin(async move {
            let histories = self.histories.read().map_err(poisoned)?;
            Ok(histories.get(session_id).map(Vec::clone).unwrap_or_default())
        })
    }

    fn append_messages<'a>(
        &'a self,
        session_id: &'a SessionId,
        messages: Vec<Message>,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            if messages.is_empty() {
                return Ok(());
            }
            let mut histories = self.histories.write().map_err(poisoned)?;
            histories.entry(session_id.clone()).or_default().extend(messages);
            Ok(())
        })
    }
}
