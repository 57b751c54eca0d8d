//! Row loader for one ingestion transaction.
//!
//! The loader borrows the open transaction, evolves the table as new fields
//! appear and inserts every record through a prepared statement cached per
//! column combination. Dropping the loader discards the cache; the caller
//! then commits or drops the transaction.

use std::collections::HashMap;

use rusqlite::{Connection, Statement, params_from_iter};
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::error::{IngestError, InsertSnafu, SchemaSnafu};
use crate::schema::{SchemaChange, SchemaManager};
use crate::source::Record;
use crate::value::{SqlValue, coerce};

/// Counters for a finished load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Rows inserted.
    pub rows: u64,
    /// Columns created during the run.
    pub columns_added: u64,
}

/// Loads records into one table inside an open transaction.
pub struct Loader<'conn> {
    conn: &'conn Connection,
    schema: SchemaManager,
    /// Prepared inserts keyed by their SQL text (one per column combination).
    statements: HashMap<String, Statement<'conn>>,
    /// Field-less records seen before the table existed.
    deferred_empty: u64,
    summary: LoadSummary,
}

impl<'conn> Loader<'conn> {
    /// Create a loader on `conn`, which must be inside the run's transaction.
    pub fn new(conn: &'conn Connection, schema: SchemaManager) -> Self {
        Self {
            conn,
            schema,
            statements: HashMap::new(),
            deferred_empty: 0,
            summary: LoadSummary::default(),
        }
    }

    /// Apply any schema change `record` requires, then insert it.
    pub fn load(&mut self, record: &Record) -> Result<(), IngestError> {
        if let Some(change) = self.schema.plan(record) {
            self.apply(change)?;
        }

        // SQLite has no zero-column tables; hold the row until one exists.
        if self.schema.is_empty() {
            self.deferred_empty += 1;
            return Ok(());
        }

        let values: Vec<SqlValue> = self
            .schema
            .columns()
            .iter()
            .map(|column| record.get(column).map_or(SqlValue::Null, coerce))
            .collect();
        self.insert(&values)
    }

    /// Finish the run, tearing down the statement cache.
    pub fn finish(self) -> LoadSummary {
        debug!(
            target = %self.schema.table(),
            cached_statements = self.statements.len(),
            "Dropping prepared statement cache"
        );
        self.summary
    }

    fn apply(&mut self, change: SchemaChange) -> Result<(), IngestError> {
        for column in change.columns().iter().filter(|c| c.contains('"')) {
            warn!(target = %self.schema.table(), column = %column, "Field name contains a double quote");
        }

        for ddl in change.statements(self.schema.table()) {
            debug!(ddl = %ddl, "Applying schema change");
            self.conn
                .execute(&ddl, [])
                .context(SchemaSnafu { ddl: ddl.as_str() })?;
        }

        let created = matches!(change, SchemaChange::CreateTable { .. });
        self.summary.columns_added += change.columns().len() as u64;
        self.schema.commit(change);

        if created && self.deferred_empty > 0 {
            let nulls = vec![SqlValue::Null; self.schema.columns().len()];
            for _ in 0..std::mem::take(&mut self.deferred_empty) {
                self.insert(&nulls)?;
            }
        }
        Ok(())
    }

    fn insert(&mut self, values: &[SqlValue]) -> Result<(), IngestError> {
        let sql = self.schema.insert_sql();

        if let Some(stmt) = self.statements.get_mut(sql) {
            stmt.execute(params_from_iter(values)).context(InsertSnafu)?;
        } else {
            debug!(sql = %sql, "Preparing insert statement");
            let mut stmt = self.conn.prepare(sql).context(InsertSnafu)?;
            stmt.execute(params_from_iter(values)).context(InsertSnafu)?;
            self.statements.insert(sql.to_string(), stmt);
        }

        self.summary.rows += 1;
        Ok(())
    }
}
