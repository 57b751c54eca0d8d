//! Read-only SQL over ingested records.
//!
//! Rows come back as ordered maps from column name to JSON value, so callers
//! see columns in the order the `SELECT` lists them.

use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::{IndexMap, IndexSet};
use rusqlite::{Batch, Connection, Statement};
use rusqlite::types::ValueRef;
use serde_json::{Number, Value};
use tracing::debug;

use sleet_core::emit;
use sleet_core::metrics::events::{QueryExecuted, QueryFailed};

use crate::error::QueryError;

/// One result row: column name to value, in result column order.
///
/// When several result columns share a name, later ones get a `:N` suffix
/// (`SELECT a, b AS a` yields keys `a` and `a:1`).
pub type Row = IndexMap<String, Value>;

/// Run a read-only statement and collect every row.
///
/// `sql` must hold exactly one statement. Statements that could modify the
/// database are rejected with [`QueryError::NotReadOnly`] before they run;
/// transaction control (`BEGIN`, `SAVEPOINT`) is undone and rejected the same
/// way.
pub fn select(conn: &Connection, sql: &str) -> Result<Vec<Row>, QueryError> {
    let start = Instant::now();
    match collect_rows(conn, sql) {
        Ok(rows) => {
            emit!(QueryExecuted {
                rows: rows.len() as u64,
                duration: start.elapsed(),
            });
            Ok(rows)
        }
        Err(e) => {
            debug!(error = %e, recoverable = e.is_recoverable(), "Query failed");
            emit!(QueryFailed { kind: e.kind() });
            Err(e)
        }
    }
}

fn collect_rows(conn: &Connection, sql: &str) -> Result<Vec<Row>, QueryError> {
    let mut batch = Batch::new(conn, sql);
    let Some(mut stmt) = batch.next().map_err(QueryError::from_sqlite)? else {
        return Err(QueryError::EmptyStatement);
    };
    if !matches!(batch.next(), Ok(None)) {
        return Err(QueryError::MultipleStatements {
            sql: sql.to_string(),
        });
    }
    if !stmt.readonly() {
        return Err(QueryError::NotReadOnly {
            sql: sql.to_string(),
        });
    }

    // BEGIN, SAVEPOINT and friends count as read-only but change the
    // connection's transaction state, which the next ingestion relies on.
    let autocommit = conn.is_autocommit();
    let rows = read_rows(&mut stmt);
    drop(stmt);
    if conn.is_autocommit() != autocommit {
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")
                .map_err(QueryError::from_sqlite)?;
        }
        return Err(QueryError::NotReadOnly {
            sql: sql.to_string(),
        });
    }
    rows
}

fn read_rows(stmt: &mut Statement<'_>) -> Result<Vec<Row>, QueryError> {
    let names = unique_names(stmt.column_names());

    let mut rows = stmt.query([]).map_err(QueryError::from_sqlite)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(QueryError::from_sqlite)? {
        let mut values = Row::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let value = row.get_ref(index).map_err(QueryError::from_sqlite)?;
            values.insert(name.clone(), to_json(value));
        }
        out.push(values);
    }
    Ok(out)
}

/// Result column names with repeats suffixed `:1`, `:2`, ... so no column is lost.
fn unique_names(names: Vec<&str>) -> Vec<String> {
    let mut seen = IndexSet::with_capacity(names.len());
    for name in names {
        let mut candidate = name.to_string();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{name}:{n}");
            n += 1;
        }
        seen.insert(candidate);
    }
    seen.into_iter().collect()
}

/// Map a stored value back to JSON. Blobs are base64 encoded.
fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    }
}
