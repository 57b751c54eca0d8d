//! Sleet: streaming NDJSON loader with an evolving SQLite schema.
//!
//! This crate handles:
//! - Decoding newline-delimited JSON objects from any byte stream
//! - Growing a table's columns as new fields appear
//! - Loading every record of a run in one transaction
//! - Answering read-only SQL over the loaded records

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod runner;
pub mod schema;
pub mod sink;
pub mod source;
pub mod value;

// Re-export commonly used items
pub use config::{EngineConfig, StorageMode};
pub use error::{ConfigError, DecodeError, IngestError, QueryError, StorageError};
pub use pipeline::{IngestStats, run_ingestion};
pub use query::Row;
pub use runner::QueryRunner;
pub use source::Record;

pub use cli::CliArgs;
pub use sleet_core::{KB, init_tracing};
