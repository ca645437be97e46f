//! Integration tests for fsa-config
//!
//! These tests verify the full config loading pipeline with real file system operations.

use std::path::PathBuf;

use fsa_cas::{HashAlgorithm, ShardLayout};
use fsa_config::{CatalogBackend, Config, LogLevel};
use tempfile::tempdir;

/// Test config loading from a real file
#[test]
fn test_load_config_from_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");

    let config_content = r#"
[storage]
base_directory = "/srv/assets/data"
spool_directory = "/srv/assets/spool"
layout = "osgrid"
hash = "blake3"
verify_reads = false

[catalog]
backend = "memory"
days_between_access_time_updates = 30

[service]
mover_interval_ms = 250
show_stats = false
"#;
    std::fs::write(&path, config_content).unwrap();

    let config = Config::from_layers(&[path]).unwrap();

    assert_eq!(config.storage.base_directory, PathBuf::from("/srv/assets/data"));
    assert_eq!(config.storage.spool_directory, PathBuf::from("/srv/assets/spool"));
    assert_eq!(config.storage.layout, ShardLayout::Osgrid);
    assert_eq!(config.storage.hash, HashAlgorithm::Blake3);
    assert!(!config.storage.verify_reads);
    assert_eq!(config.catalog.backend, CatalogBackend::Memory);
    assert_eq!(config.catalog.days_between_access_time_updates, 30);
    assert_eq!(config.service.mover_interval_ms, 250);
    assert!(!config.service.show_stats);
    // untouched keys keep their defaults
    assert_eq!(config.service.stats_interval_secs, 60);
    assert_eq!(config.service.max_name_len, 64);
}

/// Test config hierarchy: project config overrides global key by key
#[test]
fn test_config_hierarchy_project_overrides_global() {
    let temp = tempdir().unwrap();

    let global = temp.path().join("global.toml");
    std::fs::write(
        &global,
        r#"
[storage]
base_directory = "/global/data"
layout = "osgrid"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let project = temp.path().join("project.toml");
    std::fs::write(
        &project,
        r#"
[storage]
base_directory = "/project/data"
"#,
    )
    .unwrap();

    let config = Config::from_layers(&[global, project]).unwrap();

    assert_eq!(config.storage.base_directory, PathBuf::from("/project/data"));
    // sibling key from the global layer survives
    assert_eq!(config.storage.layout, ShardLayout::Osgrid);
    assert_eq!(config.logging.level, LogLevel::Debug);
}

/// Test that a malformed file surfaces a TOML error
#[test]
fn test_invalid_toml_is_an_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("broken.toml");
    std::fs::write(&path, "[storage\nlayout = ").unwrap();

    let result = Config::from_layers(&[path]);
    assert!(matches!(result, Err(fsa_config::ConfigError::Toml(_))));
}

/// Test that unknown enum values are rejected
#[test]
fn test_unknown_layout_rejected() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[storage]\nlayout = \"flat\"\n").unwrap();

    assert!(Config::from_layers(&[path]).is_err());
}

/// Test that load_from validates the result
#[test]
fn test_load_from_rejects_invalid_values() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[service]\nstats_interval_secs = 0\n").unwrap();

    let result = Config::load_from(&path);
    assert!(matches!(result, Err(fsa_config::ConfigError::Invalid(_))));
}

/// Test that the rendered defaults parse back to the same values
#[test]
fn test_default_toml_parses_back() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("defaults.toml");
    std::fs::write(&path, Config::default_toml()).unwrap();

    let config = Config::from_layers(&[path]).unwrap();
    let defaults = Config::default();
    assert_eq!(config.storage.base_directory, defaults.storage.base_directory);
    assert_eq!(config.catalog.path, defaults.catalog.path);
    assert_eq!(config.service.mover_interval_ms, defaults.service.mover_interval_ms);
}

/// Test that an empty layer list yields pure defaults
#[test]
fn test_no_layers_gives_defaults() {
    let config = Config::from_layers(&[]).unwrap();
    assert_eq!(config.storage.layout, ShardLayout::Core);
    assert_eq!(config.catalog.backend, CatalogBackend::Lmdb);
    assert!(!config.fallback.enabled);
}
