use crate::logging::{log_filter_directive, DEFAULT_LOG_FILTER};
use beacon_config::constants::{BEACON_LOG, RUST_LOG};
use serial_test::serial;
use std::env;

fn clear_log_vars() {
    env::remove_var(BEACON_LOG);
    env::remove_var(RUST_LOG);
}

#[test]
#[serial]
fn test_default_filter_when_unset() {
    clear_log_vars();
    assert_eq!(log_filter_directive(false), DEFAULT_LOG_FILTER);
}

#[test]
#[serial]
fn test_beacon_log_takes_precedence_over_rust_log() {
    clear_log_vars();
    env::set_var(BEACON_LOG, "beacon_preview=trace");
    env::set_var(RUST_LOG, "info");

    assert_eq!(log_filter_directive(false), "beacon_preview=trace");

    clear_log_vars();
}

#[test]
#[serial]
fn test_rust_log_used_as_fallback() {
    clear_log_vars();
    env::set_var(RUST_LOG, "info");

    assert_eq!(log_filter_directive(false), "info");

    clear_log_vars();
}

#[test]
#[serial]
fn test_verbose_overrides_environment() {
    clear_log_vars();
    env::set_var(BEACON_LOG, "error");

    assert_eq!(log_filter_directive(true), "debug");

    clear_log_vars();
}
