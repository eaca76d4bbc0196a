// pinmark Settings Engine
// Loads, saves, updates and resets the JSON settings file kept at the
// platform config path. Every accepted change passes `PinmarkSettings::validate`.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::PinmarkSettings;

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<PinmarkSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &PinmarkSettings;
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: PinmarkSettings,
}

impl SettingsEngine {
    /// Uses `path_override` when given, else `settings.json` in the platform config dir.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override.unwrap_or_else(|| {
            platform::get_config_dir()
                .join("settings.json")
                .to_string_lossy()
                .to_string()
        });

        Self {
            config_path,
            settings: PinmarkSettings::default(),
        }
    }

    /// Replaces the value at a dot-separated `key` inside `root`.
    /// Only keys that already exist can be set.
    fn replace_at_path(root: &mut Value, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut parts = key.split('.').peekable();
        let mut current = root;

        while let Some(part) = parts.next() {
            let map = current.as_object_mut().ok_or_else(|| {
                SettingsError::InvalidKey(format!("'{}' does not address a settings section", key))
            })?;
            let slot = map
                .get_mut(part)
                .ok_or_else(|| SettingsError::InvalidKey(format!("Key '{}' not found in settings", key)))?;

            if parts.peek().is_none() {
                *slot = value;
                return Ok(());
            }
            current = slot;
        }

        Err(SettingsError::InvalidKey("Key cannot be empty".to_string()))
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Returns defaults when the file does not exist; a malformed or invalid
    /// file is an error.
    fn load(&mut self) -> Result<PinmarkSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            self.settings = PinmarkSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: PinmarkSettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        settings.validate().map_err(SettingsError::InvalidValue)?;

        tracing::debug!(path = %self.config_path, "settings_loaded");
        self.settings = settings;
        Ok(self.settings.clone())
    }

    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))
    }

    fn get_settings(&self) -> &PinmarkSettings {
        &self.settings
    }

    /// Updates one setting by dot path, e.g. `"api.max_retries"` or
    /// `"tags.cache_timeout_secs"`, then persists.
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;
        Self::replace_at_path(&mut json_value, key, value)?;

        let new_settings: PinmarkSettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        new_settings.validate().map_err(SettingsError::InvalidValue)?;

        self.settings = new_settings;
        self.save()?;
        tracing::info!(key, "setting_updated");
        Ok(())
    }

    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = PinmarkSettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
