// ABOUTME: Configuration and environment variable management for Beacon
// ABOUTME: Env var names plus parsing helpers shared by the preview core and the CLI

pub mod constants;
pub mod env;

pub use env::{
    parse_env_or_default, parse_env_or_default_with_validation, parse_env_with_fallback,
    read_env_string,
};
