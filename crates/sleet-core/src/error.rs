//! Configuration error types.

use std::path::PathBuf;

use snafu::prelude::*;

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Table name is empty.
    #[snafu(display("Table name cannot be empty"))]
    EmptyTableName,

    /// Record queue must hold at least one record.
    #[snafu(display("queue_capacity must be greater than zero"))]
    ZeroQueueCapacity,

    /// Read buffer must be at least one byte.
    #[snafu(display("read_buffer_bytes must be greater than zero"))]
    ZeroReadBuffer,

    /// File storage was selected without a database path.
    #[snafu(display("storage 'file' requires a database path"))]
    MissingDatabasePath,
}
