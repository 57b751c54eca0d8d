//! The query runner: owns storage and ties ingestion to querying.

use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use snafu::ResultExt;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{EngineConfig, StorageMode};
use crate::error::{
    ConfigError, IngestError, OpenSnafu, PragmaSnafu, QueryError, StorageError, TempFileSnafu,
};
use crate::pipeline::{IngestStats, run_ingestion};
use crate::query::{self, Row};
use crate::sink::existing_columns;

/// Owns one storage connection and the table records are loaded into.
///
/// Ingestion takes `&mut self`, so a query cannot run while a load is in
/// flight.
pub struct QueryRunner {
    // Declared before `temp` so the connection closes before the file is removed.
    conn: Arc<Mutex<Connection>>,
    config: EngineConfig,
    temp: Option<NamedTempFile>,
}

impl QueryRunner {
    /// Open storage as described by `config`.
    pub fn open(config: EngineConfig) -> Result<Self, StorageError> {
        config.validate()?;

        let (conn, temp) = match config.storage {
            StorageMode::TempFile => {
                let temp = tempfile::Builder::new()
                    .prefix("sleet.")
                    .suffix(".db")
                    .tempfile()
                    .context(TempFileSnafu)?;
                let conn = open_file(temp.path())?;
                // Scratch database; losing it on a crash is fine.
                conn.pragma_update(None, "synchronous", "OFF")
                    .context(PragmaSnafu)?;
                (conn, Some(temp))
            }
            StorageMode::Memory => {
                let conn = Connection::open_in_memory().context(OpenSnafu { path: ":memory:" })?;
                (conn, None)
            }
            StorageMode::File => {
                let Some(path) = config.path.as_deref() else {
                    return Err(ConfigError::MissingDatabasePath.into());
                };
                (open_file(path)?, None)
            }
        };

        let runner = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
            temp,
        };
        info!(
            target = %runner.config.table,
            storage = ?runner.config.storage,
            path = ?runner.database_path(),
            "Opened storage"
        );
        Ok(runner)
    }

    /// Open a runner on a private in-memory database with default settings.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::open(EngineConfig::in_memory())
    }

    /// Wrap an existing connection. `config.storage` is ignored.
    pub fn with_connection(conn: Connection, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
            temp: None,
        })
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Path of the database file, if storage is file backed.
    pub fn database_path(&self) -> Option<&Path> {
        match &self.temp {
            Some(temp) => Some(temp.path()),
            None => self.config.path.as_deref().filter(|_| self.config.storage == StorageMode::File),
        }
    }

    /// Committed column names in table order; empty before the first commit.
    pub fn columns(&self) -> Result<Vec<String>, QueryError> {
        let conn = self.lock()?;
        existing_columns(&conn, &self.config.table).map_err(QueryError::from_sqlite)
    }

    /// Ingest every record from `reader` in one transaction.
    pub async fn ingest<R>(&mut self, reader: R) -> Result<IngestStats, IngestError>
    where
        R: Read + Send + 'static,
    {
        self.ingest_with_cancel(reader, CancellationToken::new())
            .await
    }

    /// Like [`ingest`](Self::ingest), aborting with [`IngestError::Cancelled`]
    /// when `cancel` fires.
    pub async fn ingest_with_cancel<R>(
        &mut self,
        reader: R,
        cancel: CancellationToken,
    ) -> Result<IngestStats, IngestError>
    where
        R: Read + Send + 'static,
    {
        run_ingestion(Arc::clone(&self.conn), &self.config, reader, cancel).await
    }

    /// Run a read-only query against committed data.
    pub fn select(&self, sql: &str) -> Result<Vec<Row>, QueryError> {
        let conn = self.lock()?;
        query::select(&conn, sql)
    }

    /// Like [`select`](Self::select), with unknown columns or tables read as no rows.
    pub fn select_or_empty(&self, sql: &str) -> Result<Vec<Row>, QueryError> {
        match self.select(sql) {
            Err(e) if e.is_recoverable() => Ok(Vec::new()),
            result => result,
        }
    }

    /// Close the connection and remove the temporary database, if any.
    pub fn close(self) -> Result<(), StorageError> {
        let QueryRunner { conn, temp, config } = self;

        match Arc::try_unwrap(conn) {
            Ok(mutex) => {
                let conn = mutex.into_inner().unwrap_or_else(PoisonError::into_inner);
                conn.close()
                    .map_err(|(_, source)| StorageError::Close { source })?;
            }
            Err(_) => {
                warn!(target = %config.table, "Connection still shared at close, leaving it to the last holder");
            }
        }

        if let Some(temp) = temp {
            temp.close().context(TempFileSnafu)?;
        }
        info!(target = %config.table, "Closed storage");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, QueryError> {
        self.conn.lock().map_err(|_| QueryError::LockPoisoned)
    }
}

fn open_file(path: &Path) -> Result<Connection, StorageError> {
    Connection::open(path).context(OpenSnafu {
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let runner = QueryRunner::open_in_memory().unwrap();
        assert_eq!(runner.table(), "records");
        assert_eq!(runner.config().storage, StorageMode::Memory);
        assert!(runner.database_path().is_none());
        assert!(runner.columns().unwrap().is_empty());
    }

    #[test]
    fn test_temp_file_is_removed_on_close() {
        let runner = QueryRunner::open(EngineConfig::default()).unwrap();
        let path = runner.database_path().unwrap().to_path_buf();
        assert!(path.exists());

        runner.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_file_storage_requires_path() {
        let config = EngineConfig {
            storage: StorageMode::File,
            ..EngineConfig::default()
        };
        let err = QueryRunner::open(config).err().unwrap();
        assert!(matches!(
            err,
            StorageError::Config {
                source: ConfigError::MissingDatabasePath
            }
        ));
    }

    #[test]
    fn test_with_connection_validates_config() {
        let conn = Connection::open_in_memory().unwrap();
        let config = EngineConfig {
            queue_capacity: 0,
            ..EngineConfig::in_memory()
        };
        assert!(matches!(
            QueryRunner::with_connection(conn, config),
            Err(ConfigError::ZeroQueueCapacity)
        ));
    }

    #[test]
    fn test_select_or_empty_before_ingest() {
        let runner = QueryRunner::open_in_memory().unwrap();
        assert!(matches!(
            runner.select("SELECT * FROM records"),
            Err(QueryError::NoSuchTable { .. })
        ));
        assert!(runner.select_or_empty("SELECT * FROM records").unwrap().is_empty());
    }
}
