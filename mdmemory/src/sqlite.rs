use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use mdcommon::{BoxFuture, SessionId};
use mdprovider::{Message, Role, ToolCall};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::backend::TranscriptBackend;
use crate::error::MemoryError;

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS session_messages (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    session      TEXT NOT NULL,
    role         TEXT NOT NULL,
    content      TEXT NOT NULL,
    tool_calls   TEXT,
    tool_call_id TEXT
);

CREATE INDEX IF NOT EXISTS session_messages_by_session
    ON session_messages (session, seq);
";

/// Transcripts in a single SQLite file, one row per message.
///
/// `seq` is assigned on insert and fixes replay order. Appends run inside a
/// transaction so a turn is either fully stored or not at all.
#[derive(Debug)]
pub struct SqliteBackend {
    connection: Mutex<Connection>,
}

#[derive(Serialize)]
struct CallOut<'a> {
    id: &'a str,
    name: &'a str,
    arguments: &'a str,
}

#[derive(Deserialize)]
struct CallIn {
    id: String,
    name: String,
    arguments: String,
}

struct StoredRow {
    role: String,
    content: String,
    tool_calls: Option<String>,
    tool_call_id: Option<String>,
}

impl StoredRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            role: row.get("role")?,
            content: row.get("content")?,
            tool_calls: row.get("tool_calls")?,
            tool_call_id: row.get("tool_call_id")?,
        })
    }

    fn into_message(self) -> Result<Message, MemoryError> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| MemoryError::corrupt(format!("unknown role '{}'", self.role)))?;

        Ok(Message {
            role,
            content: self.content,
            tool_calls: decode_calls(self.tool_calls.as_deref())?,
            tool_call_id: self.tool_call_id,
        })
    }
}

impl SqliteBackend {
    /// Opens (or creates) the database at `path`, creating missing parent
    /// directories first.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|err| {
                MemoryError::io(format!("cannot create {}: {err}", dir.display()))
            })?;
        }

        let connection = Connection::open(path)
            .map_err(MemoryError::sql("open database"))?;
        Self::init(connection)
    }

    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let connection =
            Connection::open_in_memory().map_err(MemoryError::sql("open in-memory database"))?;
        Self::init(connection)
    }

    fn init(connection: Connection) -> Result<Self, MemoryError> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(MemoryError::sql("set busy timeout"))?;

        let version: i64 = connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(MemoryError::sql("read schema version"))?;
        if version > SCHEMA_VERSION {
            return Err(MemoryError::database(format!(
                "schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }

        connection
            .execute_batch(SCHEMA)
            .map_err(MemoryError::sql("create schema"))?;
        connection
            .pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(MemoryError::sql("record schema version"))?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, MemoryError> {
        self.connection
            .lock()
            .map_err(|_| MemoryError::poisoned("sqlite connection"))
    }

    /// Number of stored messages for `session_id`.
    pub fn message_count(&self, session_id: &SessionId) -> Result<u64, MemoryError> {
        let count = self
            .lock()?
            .query_row(
                "SELECT COUNT(*) FROM session_messages WHERE session = ?1",
                params![session_id.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .map_err(MemoryError::sql("count messages"))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

impl TranscriptBackend for SqliteBackend {
    fn load<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<Message>, MemoryError>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare_cached(
                    "SELECT role, content, tool_calls, tool_call_id
                     FROM session_messages WHERE session = ?1 ORDER BY seq",
                )
                .map_err(MemoryError::sql("prepare load"))?;

            let rows = stmt
                .query_map(params![session_id.as_str()], StoredRow::read)
                .map_err(MemoryError::sql("load messages"))?;

            rows.map(|row| row.map_err(MemoryError::sql("read message row"))?.into_message())
                .collect()
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

            let mut conn = self.lock()?;
            let tx = conn
                .transaction()
                .map_err(MemoryError::sql("begin append"))?;
            {
                let mut insert = tx
                    .prepare_cached(
                        "INSERT INTO session_messages
                             (session, role, content, tool_calls, tool_call_id)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )
                    .map_err(MemoryError::sql("prepare append"))?;

                for message in &messages {
                    insert
                        .execute(params![
                            session_id.as_str(),
                            message.role.as_str(),
                            message.content,
                            encode_calls(&message.tool_calls)?,
                            message.tool_call_id,
                        ])
                        .map_err(MemoryError::sql("insert message"))?;
                }
            }
            tx.commit().map_err(MemoryError::sql("commit append"))
        })
    }

    fn sessions(&self) -> BoxFuture<'_, Result<Vec<SessionId>, MemoryError>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare_cached("SELECT DISTINCT session FROM session_messages ORDER BY session")
                .map_err(MemoryError::sql("prepare session list"))?;

            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(MemoryError::sql("list sessions"))?
                .map(|id| id.map(SessionId::from))
                .collect::<Result<Vec<_>, _>>()
                .map_err(MemoryError::sql("read session id"))?;
            Ok(ids)
        })
    }
}

fn encode_calls(calls: &[ToolCall]) -> Result<Option<String>, MemoryError> {
    if calls.is_empty() {
        return Ok(None);
    }

    let out = calls
        .iter()
        .map(|call| CallOut {
            id: &call.id,
            name: &call.name,
            arguments: &call.arguments,
        })
        .collect::<Vec<_>>();
    serde_json::to_string(&out)
        .map(Some)
        .map_err(|err| MemoryError::database(format!("encode tool calls: {err}")))
}

fn decode_calls(raw: Option<&str>) -> Result<Vec<ToolCall>, MemoryError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let calls = serde_json::from_str::<Vec<CallIn>>(raw)
        .map_err(|err| MemoryError::corrupt(format!("stored tool calls: {err}")))?;
    Ok(calls
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.name,
            arguments: call.arguments,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryErrorKind;

    #[test]
    fn rows_with_unknown_roles_are_corrupt() {
        let row = StoredRow {
            role: "narrator".to_string(),
            content: "once upon a time".to_string(),
            tool_calls: None,
            tool_call_id: None,
        };

        let error = row.into_message().expect_err("role should be rejected");
        assert_eq!(error.kind, MemoryErrorKind::Corrupt);
        assert!(error.message.contains("narrator"));
    }

    #[test]
    fn tool_calls_column_is_null_without_calls() {
        assert_eq!(encode_calls(&[]).expect("encode"), None);
        assert!(decode_calls(None).expect("decode").is_empty());

        let error = decode_calls(Some("[{\"id\":")).expect_err("truncated JSON");
        assert_eq!(error.kind, MemoryErrorKind::Corrupt);
    }

    #[test]
    fn databases_from_a_newer_schema_are_refused() {
        let connection = Connection::open_in_memory().expect("open");
        connection
            .pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .expect("bump version");

        let error = SqliteBackend::init(connection).expect_err("newer schema");
        assert_eq!(error.kind, MemoryErrorKind::Database);
    }

    #[tokio::test]
    async fn empty_appends_leave_no_trace() {
        let backend = SqliteBackend::open_in_memory().expect("open");
        let session = SessionId::from("conversation_9");

        backend.append(&session, Vec::new()).await.expect("append");

        assert_eq!(backend.message_count(&session).expect("count"), 0);
        assert!(backend.sessions().await.expect("sessions").is_empty());
    }
}
