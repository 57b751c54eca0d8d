//! Error types for the sleet engine.

use snafu::prelude::*;

pub use sleet_core::error::ConfigError;

/// Message prefixes SQLite uses for unknown identifiers.
const NO_SUCH_COLUMN: &str = "no such column";
const NO_SUCH_TABLE: &str = "no such table";

/// Errors raised while decoding the input stream.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// Malformed JSON, or a top-level value that is not an object.
    #[snafu(display(
        "Malformed JSON in record {record} at line {line}, column {column}: {source}"
    ))]
    Syntax {
        record: u64,
        line: usize,
        column: usize,
        source: serde_json::Error,
    },

    /// The byte source failed.
    #[snafu(display("Failed to read input near record {record}: {source}"))]
    Read {
        record: u64,
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Classify a `serde_json` error raised while decoding record number `record` (1-based).
    pub fn from_json(record: u64, source: serde_json::Error) -> Self {
        if source.is_io() {
            return DecodeError::Read { record, source };
        }
        DecodeError::Syntax {
            record,
            line: source.line(),
            column: source.column(),
            source,
        }
    }
}

/// Errors that abort an ingestion run. Every variant leaves the table untouched.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    /// The input could not be decoded.
    #[snafu(display("Decode error: {source}"))]
    Decode { source: DecodeError },

    /// Storage rejected a schema change.
    #[snafu(display("Schema change rejected ({ddl}): {source}"))]
    Schema {
        ddl: String,
        source: rusqlite::Error,
    },

    /// Storage rejected an insert.
    #[snafu(display("Insert failed: {source}"))]
    Insert { source: rusqlite::Error },

    /// Beginning, inspecting or committing the load transaction failed.
    #[snafu(display("Transaction error: {source}"))]
    Transaction { source: rusqlite::Error },

    /// The run was cancelled before it could commit.
    #[snafu(display("Ingestion cancelled"))]
    Cancelled,

    /// A pipeline stage panicked.
    #[snafu(display("Task join error: {source}"))]
    TaskJoin { source: tokio::task::JoinError },

    /// A previous holder of the connection panicked.
    #[snafu(display("Storage connection lock poisoned"))]
    ConnectionPoisoned,

    /// The engine configuration is unusable.
    #[snafu(display("Invalid configuration: {source}"))]
    InvalidConfig { source: ConfigError },
}

impl IngestError {
    /// Check if this error only reflects cancellation, not a root cause.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, IngestError::Cancelled)
    }

    /// Check if the error originated in the decode stage.
    pub fn is_decode(&self) -> bool {
        matches!(self, IngestError::Decode { .. })
    }
}

impl From<DecodeError> for IngestError {
    fn from(source: DecodeError) -> Self {
        IngestError::Decode { source }
    }
}

/// Errors returned by the query facade.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueryError {
    /// The query references a column that was never ingested.
    #[snafu(display("{message}"))]
    NoSuchColumn { message: String },

    /// The query references a table that does not exist (nothing was committed).
    #[snafu(display("{message}"))]
    NoSuchTable { message: String },

    /// The statement would modify the database or its transaction state.
    #[snafu(display("Only read-only statements are allowed: {sql}"))]
    NotReadOnly { sql: String },

    /// More than one statement was supplied.
    #[snafu(display("Expected a single statement: {sql}"))]
    MultipleStatements { sql: String },

    /// The query text holds no statement.
    #[snafu(display("Query is empty"))]
    EmptyStatement,

    /// Any other failure reported by storage.
    #[snafu(display("Query failed: {source}"))]
    Other { source: rusqlite::Error },

    /// A previous holder of the connection panicked.
    #[snafu(display("Storage connection lock poisoned"))]
    LockPoisoned,
}

impl QueryError {
    /// Map a storage error, singling out unknown columns and tables.
    pub fn from_sqlite(source: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(_, Some(message)) = &source {
            if message.starts_with(NO_SUCH_COLUMN) {
                return QueryError::NoSuchColumn {
                    message: message.clone(),
                };
            }
            if message.starts_with(NO_SUCH_TABLE) {
                return QueryError::NoSuchTable {
                    message: message.clone(),
                };
            }
        }
        QueryError::Other { source }
    }

    /// Recoverable errors may be treated as an empty result by the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            QueryError::NoSuchColumn { .. } | QueryError::NoSuchTable { .. }
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::NoSuchColumn { .. } => "no_such_column",
            QueryError::NoSuchTable { .. } => "no_such_table",
            QueryError::NotReadOnly { .. } => "not_read_only",
            QueryError::MultipleStatements { .. } => "multiple_statements",
            QueryError::EmptyStatement => "empty",
            QueryError::Other { .. } => "other",
            QueryError::LockPoisoned => "poisoned",
        }
    }
}

/// Errors that can occur while opening or closing storage.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Failed to create the temporary database file.
    #[snafu(display("Failed to create temporary database file: {source}"))]
    TempFile { source: std::io::Error },

    /// Failed to open the database.
    #[snafu(display("Failed to open database {path}: {source}"))]
    Open {
        path: String,
        source: rusqlite::Error,
    },

    /// Failed to apply connection settings.
    #[snafu(display("Failed to configure database: {source}"))]
    Pragma { source: rusqlite::Error },

    /// Failed to close the database.
    #[snafu(display("Failed to close database: {source}"))]
    Close { source: rusqlite::Error },

    /// Invalid engine configuration.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },
}

impl From<ConfigError> for StorageError {
    fn from(source: ConfigError) -> Self {
        StorageError::Config { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(message.to_string()),
        )
    }

    #[test]
    fn test_no_such_column_is_recoverable() {
        let err = QueryError::from_sqlite(sqlite_failure("no such column: ghost"));
        assert!(matches!(err, QueryError::NoSuchColumn { .. }));
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "no such column: ghost");
    }

    #[test]
    fn test_no_such_table_is_recoverable() {
        let err = QueryError::from_sqlite(sqlite_failure("no such table: records"));
        assert!(matches!(err, QueryError::NoSuchTable { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_other_failures_are_fatal() {
        let err = QueryError::from_sqlite(sqlite_failure("near \"SELEC\": syntax error"));
        assert!(matches!(err, QueryError::Other { .. }));
        assert!(!err.is_recoverable());
        assert_eq!(err.kind(), "other");
    }

    #[test]
    fn test_decode_error_carries_position() {
        let json_err = serde_json::from_str::<serde_json::Value>("{\"a\": }").unwrap_err();
        let err = DecodeError::from_json(7, json_err);
        match &err {
            DecodeError::Syntax {
                record,
                line,
                column,
                ..
            } => {
                assert_eq!(*record, 7);
                assert_eq!(*line, 1);
                assert!(*column > 0);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
        assert!(err.to_string().contains("record 7"));
    }

    #[test]
    fn test_cancelled_is_not_a_root_cause() {
        assert!(IngestError::Cancelled.is_cancelled());
        assert!(!IngestError::ConnectionPoisoned.is_cancelled());
    }
}
