use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryErrorKind {
    /// The database file or its directory could not be reached.
    Io,
    Database,
    /// A stored row no longer decodes into a message.
    Corrupt,
    /// Another thread panicked while holding the backend lock.
    Poisoned,
}

impl MemoryErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::Database => "database",
            Self::Corrupt => "corrupt",
            Self::Poisoned => "poisoned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryError {
    pub kind: MemoryErrorKind,
    pub message: String,
}

impl MemoryError {
    pub fn new(kind: MemoryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(MemoryErrorKind::Io, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(MemoryErrorKind::Database, message)
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(MemoryErrorKind::Corrupt, message)
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        Self::new(MemoryErrorKind::Poisoned, format!("{what} lock poisoned"))
    }

    /// Wraps a rusqlite failure with the step that produced it.
    pub(crate) fn sql(step: &str) -> impl FnOnce(rusqlite::Error) -> Self + '_ {
        move |err| Self::database(format!("{step}: {err}"))
    }
}

impl Display for MemoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "session store {}: {}", self.kind.as_str(), self.message)
    }
}

impl Error for MemoryError {}

impl From<std::io::Error> for MemoryError {
    fn from(value: std::io::Error) -> Self {
        Self::io(value.to_string())
    }
}
