//! Configuration resolution tests
//!
//! Tests that manipulate KBSYNC_BASE_URL are marked with #[serial] to
//! prevent ENV variable race conditions between parallel tests.

use kbsync_common::config::{
    ClientConfig, BASE_URL_ENV_VAR, DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use serial_test::serial;
use std::env;

#[test]
fn test_defaults() {
    let config = ClientConfig::default();
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
}

#[test]
fn test_full_toml() {
    let config = ClientConfig::from_toml_str(
        r#"
        [client]
        base_url = "http://kb.internal:9000/api/v1"
        poll_interval_ms = 500
        request_timeout_secs = 10
        "#,
    );
    assert_eq!(config.base_url, "http://kb.internal:9000/api/v1");
    assert_eq!(config.poll_interval_ms, 500);
    assert_eq!(config.request_timeout_secs, 10);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = ClientConfig::from_toml_str(
        r#"
        [client]
        poll_interval_ms = 1000
        "#,
    );
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.poll_interval_ms, 1000);
    assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
}

#[test]
fn test_empty_toml_is_all_defaults() {
    let config = ClientConfig::from_toml_str("");
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
}

#[test]
fn test_malformed_toml_falls_back_to_defaults() {
    let config = ClientConfig::from_toml_str("[client\nbase_url = ???");
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
}

#[test]
#[serial]
fn test_env_var_overrides_file_and_default() {
    env::set_var(BASE_URL_ENV_VAR, "http://from-env:8080/api/v1");
    let config = ClientConfig::resolve(None);
    env::remove_var(BASE_URL_ENV_VAR);
    assert_eq!(config.base_url, "http://from-env:8080/api/v1");
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var(BASE_URL_ENV_VAR, "http://from-env:8080/api/v1");
    let config = ClientConfig::resolve(Some("http://from-cli:7000/api/v1"));
    env::remove_var(BASE_URL_ENV_VAR);
    assert_eq!(config.base_url, "http://from-cli:7000/api/v1");
}

#[test]
#[serial]
fn test_empty_env_var_is_ignored() {
    env::remove_var(BASE_URL_ENV_VAR);
    let baseline = ClientConfig::resolve(None);
    env::set_var(BASE_URL_ENV_VAR, "");
    let config = ClientConfig::resolve(None);
    env::remove_var(BASE_URL_ENV_VAR);
    assert_eq!(config.base_url, baseline.base_url);
}
