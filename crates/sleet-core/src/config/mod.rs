//! Common configuration helpers.

mod vars;

pub use vars::{InterpolationResult, interpolate};

use serde::de::DeserializeOwned;

use crate::error::ConfigError;

/// Byte size constant (binary/IEC units).
pub const KB: usize = 1024;

/// Interpolate environment variables in `contents` and deserialize the YAML result.
pub fn parse_yaml<T: DeserializeOwned>(contents: &str) -> Result<T, ConfigError> {
    let result = interpolate(contents);
    if !result.is_ok() {
        return Err(ConfigError::EnvInterpolation {
            message: result.errors.join("\n"),
        });
    }

    serde_yaml::from_str(&result.text).map_err(|source| ConfigError::YamlParse { source })
}
