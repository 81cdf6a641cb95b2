//! Persisted user settings

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::StorageError;

/// `{ "user_name": ..., "emergency_whatsapp": ... }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub user_name: String,
    /// Emergency contact number, as typed by the user
    #[serde(default)]
    pub emergency_whatsapp: String,
}

impl UserSettings {
    /// Load settings; a missing or unreadable file yields empty defaults
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(settings) => settings,
            Err(e) => {
                debug!("Using default settings ({})", e);
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, StorageError> {
        let raw = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(path, json).map_err(|e| {
            warn!("Failed to save settings: {}", e);
            StorageError::io(path, e)
        })
    }

    /// Emergency number with surrounding whitespace removed, if any
    pub fn emergency_number(&self) -> Option<&str> {
        let trimmed = self.emergency_whatsapp.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = UserSettings::load(&dir.path().join("user_settings.json"));
        assert_eq!(settings, UserSettings::default());
        assert_eq!(settings.emergency_number(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/user_settings.json");
        let settings = UserSettings {
            user_name: "Sam".into(),
            emergency_whatsapp: " +44 7700 900123 ".into(),
        };
        settings.save(&path).unwrap();

        let loaded = UserSettings::load(&path);
        assert_eq!(loaded, settings);
        assert_eq!(loaded.emergency_number(), Some("+44 7700 900123"));
    }

    #[test]
    fn test_corrupt_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(UserSettings::try_load(&path).is_err());
        assert_eq!(UserSettings::load(&path), UserSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_settings.json");
        std::fs::write(&path, r#"{"user_name":"Ana"}"#).unwrap();
        let loaded = UserSettings::load(&path);
        assert_eq!(loaded.user_name, "Ana");
        assert!(loaded.emergency_whatsapp.is_empty());
    }
}
