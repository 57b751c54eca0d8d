//! Environment variable interpolation for config files.
//!
//! Supported forms:
//! - `${VAR}` - value of VAR, error if unset
//! - `${VAR:-default}` - default when VAR is unset or empty
//! - `$$` - a literal `$`

use std::env;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("placeholder pattern is valid")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Every variable that could not be resolved, so all are reported at once.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Replace `${VAR}` placeholders in `input` with values from the environment.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();

    let text = PLACEHOLDER
        .replace_all(input, |caps: &Captures| {
            let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                return "$".to_string();
            };
            let default = caps.get(2).map(|m| m.as_str());

            match (env::var(name), default) {
                (Ok(value), Some(default)) if value.is_empty() => default.to_string(),
                (Ok(value), _) if value.contains(['\n', '\r']) => {
                    errors.push(format!("environment variable '{name}' contains newlines"));
                    caps[0].to_string()
                }
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.to_string(),
                (Err(_), None) => {
                    errors.push(format!("environment variable '{name}' is not set"));
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    InterpolationResult { text, errors }
}
