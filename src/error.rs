//! Error types for the migration engine

use std::fmt;

/// Structured detail extracted from a failed SQL statement.
///
/// PostgreSQL reports errors with separate message/detail/hint fields and a
/// character position into the submitted SQL. Operators need to branch on
/// these individually, so they are never flattened into one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFailure {
    /// Primary error message
    pub message: String,
    /// Optional secondary detail
    pub detail: Option<String>,
    /// Optional hint suggesting a fix
    pub hint: Option<String>,
    /// 1-based line within the migration body, when the server reported a position
    pub line: Option<u32>,
}

impl SqlFailure {
    /// Build a `SqlFailure` from a driver error, resolving the server's
    /// character offset into a line number within `body`.
    pub fn from_postgres(err: &postgres::Error, body: &str) -> Self {
        if let Some(db) = err.as_db_error() {
            let line = db.position().and_then(|pos| match pos {
                postgres::error::ErrorPosition::Original(offset) => {
                    Some(line_of_offset(body, *offset))
                }
                postgres::error::ErrorPosition::Internal { .. } => None,
            });
            Self {
                message: db.message().to_string(),
                detail: db.detail().map(str::to_string),
                hint: db.hint().map(str::to_string),
                line,
            }
        } else {
            Self {
                message: err.to_string(),
                detail: None,
                hint: None,
                line: None,
            }
        }
    }
}

impl fmt::Display for SqlFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\n  Detail: {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  Hint: {hint}")?;
        }
        Ok(())
    }
}

/// PostgreSQL reports error positions as 1-based character offsets.
fn line_of_offset(body: &str, offset: u32) -> u32 {
    // Server positions are 1-based and count characters, not bytes.
    let offset = (offset.saturating_sub(1)) as usize;
    let mut line = 1u32;
    for (i, ch) in body.chars().enumerate() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
        }
    }
    line
}

/// Migration engine errors
#[derive(Debug)]
pub enum FloodgateError {
    /// Cannot reach the database; fatal, nothing is attempted
    Connectivity(String),
    /// Configuration could not be loaded or is invalid
    Config(String),
    /// File system error while reading migration files
    Io(String),
    /// A migration's SQL failed; fatal to the batch
    Execution {
        version: String,
        filename: String,
        failure: SqlFailure,
    },
    /// A must-run-outside-transaction statement is mixed with explicit
    /// transaction control that the executor cannot honor
    NonTransactionalConflict {
        version: String,
        filename: String,
        statement: String,
    },
    /// The migration succeeded but recording it in the ledger failed
    LedgerWrite { version: String, source: String },
    /// Driver error outside a migration body (ledger reads, session setup)
    Postgres(postgres::Error),
}

impl fmt::Display for FloodgateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloodgateError::Connectivity(msg) => {
                write!(f, "Cannot connect to database: {msg}")
            }
            FloodgateError::Config(msg) => {
                write!(f, "Configuration error: {msg}")
            }
            FloodgateError::Io(msg) => {
                write!(f, "I/O error: {msg}")
            }
            FloodgateError::Execution {
                version,
                filename,
                failure,
            } => {
                write!(f, "Migration {version} ({filename}) failed: {failure}")
            }
            FloodgateError::NonTransactionalConflict {
                version,
                filename,
                statement,
            } => {
                write!(
                    f,
                    "Migration {version} ({filename}) mixes a statement that must run \
                     outside a transaction with explicit transaction control ('{statement}').\n\
                     Remove the BEGIN/COMMIT from the file, or split it into separate \
                     migrations, so the executor can choose an execution policy."
                )
            }
            FloodgateError::LedgerWrite { version, source } => {
                write!(
                    f,
                    "Migration {version} was applied but could not be recorded: {source}\n\
                     The ledger requires manual reconciliation before the next run."
                )
            }
            FloodgateError::Postgres(e) => {
                write!(f, "PostgreSQL error: {e}")
            }
        }
    }
}

impl std::error::Error for FloodgateError {}

impl From<postgres::Error> for FloodgateError {
    fn from(err: postgres::Error) -> Self {
        FloodgateError::Postgres(err)
    }
}
