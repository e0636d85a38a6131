//! Tests for configuration loading and database path resolution

use qstage_common::config::{load_toml, resolve_database_path};
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct ProbeConfig {
    database_path: String,
}

#[test]
fn test_toml_file_used_when_no_override() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "database_path = \"/tmp/from-toml.db\"").expect("write");

    let path = resolve_database_path(None, "QSTAGE_TEST_UNSET_VAR", Some(file.path()));
    assert_eq!(path, PathBuf::from("/tmp/from-toml.db"));
}

#[test]
fn test_explicit_path_beats_toml() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "database_path = \"/tmp/from-toml.db\"").expect("write");

    let path = resolve_database_path(Some("/tmp/explicit.db"), "QSTAGE_TEST_UNSET_VAR", Some(file.path()));
    assert_eq!(path, PathBuf::from("/tmp/explicit.db"));
}

#[test]
fn test_missing_config_file_falls_back_to_default() {
    let path = resolve_database_path(
        None,
        "QSTAGE_TEST_UNSET_VAR",
        Some(std::path::Path::new("/nonexistent/qstage.toml")),
    );
    assert!(path.to_string_lossy().ends_with("qstage.db"));
}

#[test]
fn test_load_toml_typed() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "database_path = \"/tmp/typed.db\"").expect("write");

    let config: ProbeConfig = load_toml(file.path()).expect("load failed");
    assert_eq!(config.database_path, "/tmp/typed.db");
}

#[test]
fn test_load_toml_reports_malformed_file() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "database_path = [not valid").expect("write");

    let result: Result<ProbeConfig, _> = load_toml(file.path());
    assert!(result.is_err());
}
