//! Configuration resolution and loading tests
//!
//! Tests that touch the process environment are marked `#[serial]` so they
//! never observe each other's variables.

use serial_test::serial;
use ssai_common::config::resolve_config_path;
use ssai_common::{AdInsertionConfig, Error, TimeFallback};
use std::env;
use std::io::Write;
use std::path::PathBuf;

const VAR: &str = "SSAI_CONFIG_TEST";

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
#[serial]
fn test_env_var_used_without_cli_arg() {
    let file = config_file("time_fallback = \"zero\"\n");
    env::set_var(VAR, file.path());

    let resolved = resolve_config_path(None, VAR);
    env::remove_var(VAR);

    assert_eq!(resolved.as_deref(), Some(file.path()));
    let config = AdInsertionConfig::load(file.path()).unwrap();
    assert_eq!(config.time_fallback, TimeFallback::Zero);
}

#[test]
#[serial]
fn test_cli_arg_takes_precedence_over_env_var() {
    let from_env = config_file("");
    let from_cli = config_file("snapback = false\n");
    env::set_var(VAR, from_env.path());

    let resolved = resolve_config_path(Some(from_cli.path()), VAR);
    env::remove_var(VAR);

    assert_eq!(resolved.as_deref(), Some(from_cli.path()));
    assert!(!AdInsertionConfig::load(from_cli.path()).unwrap().snapback);
}

#[test]
#[serial]
fn test_empty_env_var_ignored() {
    env::set_var(VAR, "");
    let resolved = resolve_config_path(None, VAR);
    env::remove_var(VAR);

    assert_ne!(resolved, Some(PathBuf::new()));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = AdInsertionConfig::load(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_zero_event_bus_capacity_rejected() {
    let file = config_file("event_bus_capacity = 0\n");
    let result = AdInsertionConfig::load(file.path());
    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("event_bus_capacity")));
}

#[test]
fn test_live_identity_passes_through_verbatim() {
    let file = config_file(
        "[stream]\nlive = true\nasset_key = \"c-rArva4ShKVIAkNfy6HUQ\"\nauth_token = \"tok\"\n",
    );
    let config = AdInsertionConfig::load(file.path()).unwrap();
    assert!(config.stream.live);
    assert_eq!(config.stream.asset_key.as_deref(), Some("c-rArva4ShKVIAkNfy6HUQ"));
    assert_eq!(config.stream.auth_token.as_deref(), Some("tok"));
    assert_eq!(config.stream.content_source_id, None);
}
