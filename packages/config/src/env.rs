// ABOUTME: Environment variable parsing utilities
// ABOUTME: Typed lookups with defaults, validation warnings and fallback variables

use std::str::FromStr;
use tracing::warn;

/// Read an environment variable as a trimmed, non-empty string
pub fn read_env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an environment variable with a fallback default value
/// Returns the parsed value or the default if the variable is not set or cannot be parsed
pub fn parse_env_or_default<T>(var_name: &str, default: T) -> T
where
    T: FromStr,
{
    read_env_string(var_name)
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Parse an environment variable with validation
///
/// Returns the parsed value if it passes validation, otherwise returns the default.
/// A variable that is set but unparseable or rejected by `validator` is logged at
/// warning level; an unset variable is not.
pub fn parse_env_or_default_with_validation<T, F>(var_name: &str, default: T, validator: F) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    F: Fn(T) -> bool,
{
    let Some(raw_value) = read_env_string(var_name) else {
        return default;
    };

    match raw_value.parse::<T>() {
        Ok(parsed_value) if validator(parsed_value) => parsed_value,
        Ok(_) => {
            warn!(
                "Environment variable {} has invalid value '{}', using default: {}",
                var_name, raw_value, default
            );
            default
        }
        Err(_) => {
            warn!(
                "Environment variable {} has unparseable value '{}', using default: {}",
                var_name, raw_value, default
            );
            default
        }
    }
}

/// Parse an environment variable with fallback to another variable
/// Tries the primary variable first, then falls back to the secondary, then to the default
pub fn parse_env_with_fallback<T>(primary_var: &str, fallback_var: &str, default: T) -> T
where
    T: FromStr,
{
    read_env_string(primary_var)
        .or_else(|| read_env_string(fallback_var))
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
