//! Incremental schema tracking.
//!
//! The table starts without columns. Each incoming record is compared with
//! the columns known so far and the manager produces the DDL needed to make
//! room for its new fields. Columns are only ever added: never removed,
//! renamed or retyped, and they carry no declared type (SQLite is
//! schema-on-read).

use indexmap::IndexSet;
use tracing::info;

use crate::source::Record;

/// DDL required before a record can be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// The first record with fields defines the initial table.
    CreateTable { columns: Vec<String> },
    /// Later records add one column per new field, in first-seen order.
    AddColumns { columns: Vec<String> },
}

impl SchemaChange {
    /// New column names, in first-seen order.
    pub fn columns(&self) -> &[String] {
        match self {
            SchemaChange::CreateTable { columns } | SchemaChange::AddColumns { columns } => columns,
        }
    }

    /// Render the DDL statements for this change against `table`.
    pub fn statements(&self, table: &str) -> Vec<String> {
        let table = quote_identifier(table);
        match self {
            SchemaChange::CreateTable { columns } => {
                vec![format!("CREATE TABLE {table}({})", column_list(columns))]
            }
            SchemaChange::AddColumns { columns } => columns
                .iter()
                .map(|column| {
                    format!(
                        "ALTER TABLE {table} ADD COLUMN {}",
                        quote_identifier(column)
                    )
                })
                .collect(),
        }
    }
}

/// Tracks the ordered set of columns of one table during a run.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    table: String,
    columns: IndexSet<String>,
    /// Insert statement for the current column list, rebuilt on every commit.
    insert_sql: String,
}

impl SchemaManager {
    /// Create a manager for a table that does not exist yet.
    pub fn new(table: impl Into<String>) -> Self {
        Self::with_columns(table, Vec::new())
    }

    /// Create a manager seeded with the columns of an existing table.
    pub fn with_columns(table: impl Into<String>, columns: Vec<String>) -> Self {
        let mut manager = Self {
            table: table.into(),
            columns: columns.into_iter().collect(),
            insert_sql: String::new(),
        };
        manager.insert_sql = manager.render_insert();
        manager
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Known columns in table order.
    pub fn columns(&self) -> &IndexSet<String> {
        &self.columns
    }

    /// True until the table has been created.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Compute the DDL needed before `record` can be inserted, if any.
    pub fn plan(&self, record: &Record) -> Option<SchemaChange> {
        let new_columns: Vec<String> = record
            .keys()
            .filter(|field| !self.columns.contains(field.as_str()))
            .cloned()
            .collect();

        if new_columns.is_empty() {
            None
        } else if self.columns.is_empty() {
            Some(SchemaChange::CreateTable {
                columns: new_columns,
            })
        } else {
            Some(SchemaChange::AddColumns {
                columns: new_columns,
            })
        }
    }

    /// Record a change once storage has accepted its DDL.
    pub fn commit(&mut self, change: SchemaChange) {
        let columns = match change {
            SchemaChange::CreateTable { columns } | SchemaChange::AddColumns { columns } => columns,
        };
        info!(
            target = %self.table,
            new_columns = columns.len(),
            column_names = ?columns,
            "Schema evolution: adding new columns"
        );
        self.columns.extend(columns);
        self.insert_sql = self.render_insert();
    }

    /// Parameterized insert covering every known column, in table order.
    ///
    /// The text doubles as the prepared statement cache key: it changes
    /// exactly when the column list does.
    pub fn insert_sql(&self) -> &str {
        &self.insert_sql
    }

    fn render_insert(&self) -> String {
        format!(
            "INSERT INTO {}({}) VALUES ({})",
            quote_identifier(&self.table),
            column_list(self.columns.iter()),
            placeholders(self.columns.len())
        )
    }
}

/// Quote a name as an SQL identifier.
///
/// Names are used verbatim; an embedded `"` is doubled so the name cannot
/// terminate the identifier early.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list<'a>(columns: impl IntoIterator<Item = &'a String>) -> String {
    columns
        .into_iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(",")
}

/// Positional placeholders `?1,?2,...,?n`, generated per statement.
fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(",")
}
