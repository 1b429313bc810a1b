//! Helpers for reading configuration from environment variables.

use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    #[error("{name} is required")]
    Missing { name: String },

    #[error("invalid value for {name}={value}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

impl EnvError {
    pub fn invalid(name: &str, value: &str, reason: impl Display) -> Self {
        EnvError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Read a variable, treating unset and blank values alike.
pub fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(non_empty)
}

/// Read a variable that must be set.
pub fn required(name: &str) -> Result<String, EnvError> {
    optional(name).ok_or_else(|| EnvError::Missing {
        name: name.to_string(),
    })
}

/// Read and parse a variable, falling back to `default` when unset.
pub fn parse_or<T>(name: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(name, optional(name), default)
}

/// Parse an already-read value; split out so it can be tested without
/// touching the process environment.
pub fn parse_value<T>(name: &str, raw: Option<String>, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|e| EnvError::invalid(name, &value, e)),
    }
}

pub fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
