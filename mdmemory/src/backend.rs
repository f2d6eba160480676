//! Backend seam plus the process-local backend.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use mdcommon::{BoxFuture, SessionId};
use mdprovider::Message;

use crate::error::MemoryError;
use crate::sqlite::SqliteBackend;

/// Append-only transcripts keyed by session id.
pub trait TranscriptBackend: Send + Sync {
    /// Every message of the session in append order; unknown sessions are empty.
    fn load<'a>(&'a self, session_id: &'a SessionId)
    -> BoxFuture<'a, Result<Vec<Message>, MemoryError>>;

    /// Appends all of `messages` or none of them.
    fn append<'a>(
        &'a self,
        session_id: &'a SessionId,
        messages: Vec<Message>,
    ) -> BoxFuture<'a, Result<(), MemoryError>>;

    /// Sessions holding at least one message, sorted by id.
    fn sessions(&self) -> BoxFuture<'_, Result<Vec<SessionId>, MemoryError>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackendConfig {
    #[default]
    Volatile,
    Sqlite {
        path: PathBuf,
    },
}

pub fn open_backend(config: BackendConfig) -> Result<Arc<dyn TranscriptBackend>, MemoryError> {
    let backend: Arc<dyn TranscriptBackend> = match config {
        BackendConfig::Volatile => Arc::new(VolatileBackend::default()),
        BackendConfig::Sqlite { path } => Arc::new(SqliteBackend::open(path)?),
    };
    Ok(backend)
}

/// Keeps transcripts for the life of the process.
#[derive(Debug, Default)]
pub struct VolatileBackend {
    transcripts: Mutex<BTreeMap<SessionId, Vec<Message>>>,
}

impl VolatileBackend {
    fn with_transcripts<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<SessionId, Vec<Message>>) -> T,
    ) -> Result<T, MemoryError> {
        let mut transcripts = self
            .transcripts
            .lock()
            .map_err(|_| MemoryError::poisoned("volatile transcript"))?;
        Ok(f(&mut transcripts))
    }
}

impl TranscriptBackend for VolatileBackend {
    fn load<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<Message>, MemoryError>> {
        Box::pin(async move {
            self.with_transcripts(|all| all.get(session_id).cloned().unwrap_or_default())
        })
    }

    fn append<'a>(
        &'a self,
        session_id: &'a SessionId,
        messages: Vec<Message>,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move {
            if messages.is_empty() {
                return Ok(());
            }
            self.with_transcripts(|all| {
                all.entry(session_id.clone()).or_default().extend(messages);
            })
        })
    }

    fn sessions(&self) -> BoxFuture<'_, Result<Vec<SessionId>, MemoryError>> {
        Box::pin(async move { self.with_transcripts(|all| all.keys().cloned().collect()) })
    }
}
