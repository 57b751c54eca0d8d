//! Command line front end for the `sleet` binary.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use snafu::prelude::*;
use tracing::info;

use crate::config::{EngineConfig, StorageMode};
use crate::error::{ConfigError, IngestError, QueryError, StorageError};
use crate::runner::QueryRunner;

#[derive(Parser, Debug)]
#[command(version, about = "Load NDJSON into a SQL table and query it")]
pub struct CliArgs {
    /// Keep the database in memory instead of a temporary file
    #[arg(long)]
    pub memory: bool,

    /// Path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Table name to load records into
    #[arg(long)]
    pub table: Option<String>,

    /// Print nothing when the query names a column or table that was never loaded
    #[arg(long)]
    pub skip_unknown_columns: bool,

    /// Read-only SQL to run once loading finishes
    pub query: Option<String>,

    /// NDJSON input file (defaults to stdin)
    pub input: Option<PathBuf>,
}

impl CliArgs {
    /// Build the engine configuration: file (or defaults), then flag overrides.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };
        if self.memory {
            config.storage = StorageMode::Memory;
        }
        if let Some(table) = &self.table {
            config.table = table.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Errors surfaced by the command line front end.
#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Failed to load config: {source}"))]
    Config { source: ConfigError },

    #[snafu(display("{source}"))]
    Storage { source: StorageError },

    #[snafu(display("Ingestion failed: {source}"))]
    Ingest { source: IngestError },

    #[snafu(display("Query failed: {source}"))]
    Query { source: QueryError },

    #[snafu(display("Failed to open input {}: {source}", path.display()))]
    Input { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to encode row: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(display("Failed to write output: {source}"))]
    Output { source: io::Error },
}

/// Load the input, run the query and print one JSON object per row.
pub async fn run(args: &CliArgs, query: &str) -> Result<(), CliError> {
    let config = args.engine_config().context(ConfigSnafu)?;

    let reader: Box<dyn Read + Send> = match &args.input {
        Some(path) => Box::new(File::open(path).context(InputSnafu { path: path.clone() })?),
        None => Box::new(io::stdin()),
    };

    let mut runner = QueryRunner::open(config).context(StorageSnafu)?;
    let stats = runner.ingest(reader).await.context(IngestSnafu)?;
    info!(
        target = %runner.table(),
        storage = ?runner.config().storage,
        records = stats.records,
        columns_added = stats.columns_added,
        "Input loaded"
    );

    let rows = if args.skip_unknown_columns {
        runner.select_or_empty(query)
    } else {
        runner.select(query)
    }
    .context(QuerySnafu)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for row in &rows {
        serde_json::to_writer(&mut out, row).context(EncodeSnafu)?;
        out.write_all(b"\n").context(OutputSnafu)?;
    }
    out.flush().context(OutputSnafu)?;
    drop(out);

    runner.close().context(StorageSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = CliArgs::parse_from([
            "sleet",
            "--memory",
            "--table",
            "events",
            "SELECT * FROM events",
            "input.ndjson",
        ]);
        assert!(args.memory);
        assert_eq!(args.query.as_deref(), Some("SELECT * FROM events"));
        assert_eq!(args.input, Some(PathBuf::from("input.ndjson")));

        let config = args.engine_config().unwrap();
        assert_eq!(config.storage, StorageMode::Memory);
        assert_eq!(config.table, "events");
    }

    #[test]
    fn test_no_query_is_allowed() {
        let args = CliArgs::parse_from(["sleet"]);
        assert!(args.query.is_none());
        assert_eq!(args.engine_config().unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_empty_table_flag_is_rejected() {
        let args = CliArgs::parse_from(["sleet", "--table", "", "SELECT 1"]);
        assert!(matches!(
            args.engine_config(),
            Err(ConfigError::EmptyTableName)
        ));
    }
}
