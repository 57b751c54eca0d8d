//! sleet-core: Shared plumbing for the sleet engine and CLI.
//!
//! - `config/` - YAML loading with environment variable interpolation
//! - `metrics/` - Internal events emitted through the `metrics` facade
//! - `tracing` - Subscriber setup for CLI applications
//! - `error` - Configuration error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod tracing;

pub use config::{InterpolationResult, KB, interpolate, parse_yaml};
pub use error::ConfigError;
pub use crate::tracing::init_tracing;
