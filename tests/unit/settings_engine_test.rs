//! Integration-level unit tests for the SettingsEngine public API.
//!
//! These tests exercise the SettingsEngine through its public trait interface:
//! default loading, dot-path updates, validation, persistence and reset.

use pinmark::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use pinmark::types::errors::SettingsError;
use pinmark::types::settings::PinmarkSettings;
use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;

/// Helper: create a SettingsEngine backed by a temp directory that lives for the
/// duration of the test (the caller holds the `TempDir` handle).
fn engine_in_temp(dir: &TempDir) -> SettingsEngine {
    let path = dir
        .path()
        .join("settings.json")
        .to_string_lossy()
        .to_string();
    SettingsEngine::new(Some(path))
}

#[test]
fn test_load_defaults_when_no_config_file_exists() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);

    let settings = engine.load().unwrap();

    assert_eq!(settings, PinmarkSettings::default());
}

#[test]
fn test_default_values() {
    let defaults = PinmarkSettings::default();

    assert_eq!(defaults.api.base_url, "https://api.pinboard.in/v1/");
    assert_eq!(defaults.api.max_retries, 2);
    assert_eq!(defaults.api.retry_delay_ms, 1000);
    assert_eq!(defaults.api.retry_delays_ms, vec![1000, 2000, 5000]);
    assert!(defaults.api.auth_token.is_none());
    assert!(!defaults.api.strip_url_hash);

    assert_eq!(defaults.tags.recent_tags_count_max, 32);
    assert_eq!(defaults.tags.init_recent_posts_count, 15);
    assert_eq!(defaults.tags.cache_timeout_secs, 300);
    assert_eq!(defaults.tags.recent_days, 7);

    assert_eq!(defaults.suggestions.limit, 30);
}

/// A change made through one engine is visible to a fresh engine reading the
/// same file.
#[test]
fn test_set_value_persists_changes() {
    let dir = TempDir::new().unwrap();

    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();
        engine.set_value("api.max_retries", json!(4)).unwrap();
        engine.set_value("api.auth_token", json!("alice:SECRET")).unwrap();
    }

    let mut engine = engine_in_temp(&dir);
    let loaded = engine.load().unwrap();
    assert_eq!(loaded.api.max_retries, 4);
    assert_eq!(loaded.api.auth_token.as_deref(), Some("alice:SECRET"));
}

#[rstest]
#[case("tags.cache_timeout_secs", json!(60))]
#[case("tags.recent_tags_count_max", json!(10))]
#[case("api.strip_url_hash", json!(true))]
#[case("api.retry_delays_ms", json!([100, 200]))]
#[case("suggestions.limit", json!(5))]
fn test_set_value_accepts_valid_updates(#[case] key: &str, #[case] value: serde_json::Value) {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    engine.set_value(key, value.clone()).unwrap();

    let as_json = serde_json::to_value(engine.get_settings()).unwrap();
    let (section, field) = key.split_once('.').unwrap();
    assert_eq!(as_json[section][field], value);
}

#[rstest]
#[case("", json!(1))]
#[case("api.nope", json!(1))]
#[case("nope.max_retries", json!(1))]
#[case("api.max_retries.deeper", json!(1))]
fn test_set_value_rejects_unknown_keys(#[case] key: &str, #[case] value: serde_json::Value) {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let result = engine.set_value(key, value);

    assert!(matches!(result, Err(SettingsError::InvalidKey(_))), "{:?}", result);
}

#[rstest]
#[case("api.max_retries", json!("two"))]
#[case("api.max_retries", json!(0))]
#[case("api.base_url", json!("ftp://example.com"))]
#[case("suggestions.limit", json!(0))]
#[case("tags.recent_tags_count_max", json!(-1))]
fn test_set_value_rejects_invalid_values(#[case] key: &str, #[case] value: serde_json::Value) {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let result = engine.set_value(key, value);

    assert!(matches!(result, Err(SettingsError::InvalidValue(_))), "{:?}", result);
    assert_eq!(*engine.get_settings(), PinmarkSettings::default());
}

#[test]
fn test_reset_restores_defaults_on_disk() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();
    engine.set_value("tags.recent_days", json!(30)).unwrap();

    engine.reset().unwrap();

    assert_eq!(*engine.get_settings(), PinmarkSettings::default());
    let mut reloaded = engine_in_temp(&dir);
    assert_eq!(reloaded.load().unwrap(), PinmarkSettings::default());
}

#[test]
fn test_partial_file_fills_missing_fields_with_defaults() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in_temp(&dir);
    std::fs::write(engine.get_config_path(), r#"{"api": {"max_retries": 3}}"#).unwrap();

    let mut engine = engine_in_temp(&dir);
    let loaded = engine.load().unwrap();

    assert_eq!(loaded.api.max_retries, 3);
    assert_eq!(loaded.api.retry_delays_ms, vec![1000, 2000, 5000]);
    assert_eq!(loaded.tags, PinmarkSettings::default().tags);
}

#[test]
fn test_load_malformed_json_fails() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in_temp(&dir);
    std::fs::write(engine.get_config_path(), "{ invalid json }").unwrap();

    let mut engine = engine_in_temp(&dir);
    assert!(matches!(engine.load(), Err(SettingsError::SerializationError(_))));
}

#[test]
fn test_load_rejects_file_that_fails_validation() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in_temp(&dir);
    std::fs::write(engine.get_config_path(), r#"{"api": {"max_retries": 0}}"#).unwrap();

    let mut engine = engine_in_temp(&dir);
    assert!(matches!(engine.load(), Err(SettingsError::InvalidValue(_))));
}

#[test]
fn test_default_config_path_uses_platform_dir() {
    let engine = SettingsEngine::new(None);
    let path = engine.get_config_path();
    assert!(path.ends_with("settings.json"));
    assert!(path.to_lowercase().contains("pinmark"));
}
