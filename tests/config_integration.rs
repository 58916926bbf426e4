//! Configuration system integration tests for Jarvis.
//!
//! Tests the load, save, migrate and reset functionality of the configuration
//! system using temporary files to avoid affecting the real config.

use std::fs;
use std::time::Duration;
use tempfile::TempDir;

use jarvis_lib::config::{
    load_config_from, reset_config_at, save_config_to, Config, ConfigError, ResponderKind,
    CURRENT_VERSION, DEFAULT_FALLBACK_REPLY,
};

fn config_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("config.json")
}

// =============================================================================
// Load / Save
// =============================================================================

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_config_from(&config_path(&dir)).unwrap();

    assert_eq!(config.version, CURRENT_VERSION);
    assert_eq!(config.turn.silence_delay(), Duration::from_millis(1500));
    assert_eq!(config.turn.recovery_delay(), Duration::from_millis(3000));
    assert_eq!(config.turn.fallback_reply, DEFAULT_FALLBACK_REPLY);
    assert_eq!(config.responder.kind, ResponderKind::Chat);
    assert!(!config_path(&dir).exists());
}

#[test]
fn test_save_then_load_preserves_values() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);

    let mut config = Config::default();
    config.turn.silence_delay_ms = 2000;
    config.responder.kind = ResponderKind::Rules;
    config.responder.auth_token = Some("token-123".to_string());
    config.general.log_to_file = false;
    save_config_to(&config, &path).unwrap();

    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded.turn.silence_delay_ms, 2000);
    assert_eq!(loaded.responder.kind, ResponderKind::Rules);
    assert_eq!(loaded.responder.auth_token.as_deref(), Some("token-123"));
    assert!(!loaded.general.log_to_file);
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("config.json");

    save_config_to(&Config::default(), &path).unwrap();
    assert!(path.exists());
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);
    fs::write(
        &path,
        r#"{"version": 2, "turn": {"recovery_delay_ms": 5000}, "responder": {"kind": "rules"}}"#,
    )
    .unwrap();

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.turn.recovery_delay_ms, 5000);
    assert_eq!(config.turn.silence_delay_ms, 1500);
    assert_eq!(config.responder.kind, ResponderKind::Rules);
    assert_eq!(config.general.log_filter, "info");
}

#[test]
fn test_corrupted_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(load_config_from(&path), Err(ConfigError::Parse(_))));
}

// =============================================================================
// Migration
// =============================================================================

#[test]
fn test_version_one_is_migrated_and_written_back() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);
    fs::write(&path, r#"{"version": 1, "turn": {"silence_delay_ms": 1000}}"#).unwrap();

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.version, CURRENT_VERSION);
    assert_eq!(config.turn.silence_delay_ms, 1500);

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["version"], CURRENT_VERSION);
}

#[test]
fn test_custom_delay_survives_migration() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);
    fs::write(&path, r#"{"version": 1, "turn": {"silence_delay_ms": 2500}}"#).unwrap();

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.turn.silence_delay_ms, 2500);
}

#[test]
fn test_future_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);
    fs::write(&path, r#"{"version": 99}"#).unwrap();

    assert!(matches!(
        load_config_from(&path),
        Err(ConfigError::UnknownVersion(99))
    ));
}

// =============================================================================
// Validation / Reset
// =============================================================================

#[test]
fn test_zero_delay_is_invalid() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);
    fs::write(&path, r#"{"version": 2, "turn": {"silence_delay_ms": 0}}"#).unwrap();

    assert!(matches!(load_config_from(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_chat_without_endpoint_is_invalid() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);
    fs::write(
        &path,
        r#"{"version": 2, "responder": {"kind": "chat", "endpoint_url": ""}}"#,
    )
    .unwrap();

    assert!(matches!(load_config_from(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_reset_restores_defaults() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);

    let mut config = Config::default();
    config.turn.recovery_delay_ms = 9000;
    save_config_to(&config, &path).unwrap();

    let reset = reset_config_at(&path).unwrap();
    assert_eq!(reset.turn.recovery_delay_ms, 3000);
    assert_eq!(load_config_from(&path).unwrap().turn.recovery_delay_ms, 3000);
}
