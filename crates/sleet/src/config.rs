//! Configuration for the sleet engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::source::DEFAULT_READ_BUFFER;

/// Where the database lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// A temporary file, deleted when the runner is dropped.
    #[default]
    TempFile,
    /// A private in-memory database.
    Memory,
    /// A database file at `path`, kept after the run.
    File,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Table that records are loaded into.
    #[serde(default = "default_table")]
    pub table: String,
    /// Capacity of the queue between the decode and load stages.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Read buffer size for the input stream, in bytes.
    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,
    /// Storage backing.
    #[serde(default)]
    pub storage: StorageMode,
    /// Database path, required when `storage` is `file`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_table() -> String {
    "records".to_string()
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_read_buffer_bytes() -> usize {
    DEFAULT_READ_BUFFER
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            queue_capacity: default_queue_capacity(),
            read_buffer_bytes: default_read_buffer_bytes(),
            storage: StorageMode::default(),
            path: None,
        }
    }
}

impl EngineConfig {
    /// Default configuration backed by an in-memory database.
    pub fn in_memory() -> Self {
        Self {
            storage: StorageMode::Memory,
            ..Self::default()
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse configuration from YAML, interpolating `${VAR}` placeholders.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = sleet_core::parse_yaml(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.is_empty() {
            return Err(ConfigError::EmptyTableName);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.read_buffer_bytes == 0 {
            return Err(ConfigError::ZeroReadBuffer);
        }
        if self.storage == StorageMode::File && self.path.is_none() {
            return Err(ConfigError::MissingDatabasePath);
        }
        Ok(())
    }
}
