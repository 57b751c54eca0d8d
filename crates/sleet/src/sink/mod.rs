//! Output side of the pipeline: loading records into storage.

mod loader;

pub use loader::{LoadSummary, Loader};

use rusqlite::Connection;

/// Column names of `table` in table order; empty when the table does not exist.
pub fn existing_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let names = stmt.query_map([table], |row| row.get::<_, String>(0))?;
    names.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_columns() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(existing_columns(&conn, "records").unwrap().is_empty());

        conn.execute_batch(r#"CREATE TABLE "records"("b", "a")"#)
            .unwrap();
        assert_eq!(existing_columns(&conn, "records").unwrap(), vec!["b", "a"]);
    }
}
