//! Persisted user preferences (display name, webcam enabled).

use crate::errors::RoomError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// User preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub display_name: Option<String>,
    pub webcam_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            display_name: None,
            webcam_enabled: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed preferences: {0}")]
    Format(#[from] serde_json::Error),
}

impl From<PreferencesError> for RoomError {
    fn from(err: PreferencesError) -> Self {
        RoomError::Preferences(err.to_string())
    }
}

/// Small persisted key/value record of user preferences.
pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Result<Preferences, PreferencesError>;

    fn save(&self, preferences: &Preferences) -> Result<(), PreferencesError>;

    fn set_display_name(&self, display_name: &str) -> Result<(), PreferencesError> {
        let mut preferences = self.load()?;
        preferences.display_name = Some(display_name.to_string());
        self.save(&preferences)
    }

    fn set_webcam_enabled(&self, enabled: bool) -> Result<(), PreferencesError> {
        let mut preferences = self.load()?;
        preferences.webcam_enabled = enabled;
        self.save(&preferences)
    }
}

/// Preferences kept in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    preferences: Mutex<Preferences>,
}

impl MemoryPreferenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_preferences(preferences: Preferences) -> Self {
        Self {
            preferences: Mutex::new(preferences),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Preferences, PreferencesError> {
        Ok(self
            .preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        *self
            .preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = preferences.clone();
        Ok(())
    }
}

/// Preferences stored as a JSON file. A missing file reads as defaults.
#[derive(Debug)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
}

impl JsonFilePreferenceStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn load(&self) -> Result<Preferences, PreferencesError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    target: "room.preferences",
                    path = %self.path.display(),
                    "No preference file, using defaults"
                );
                Ok(Preferences::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(preferences)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// Store for `path`, or an in-memory store when no path is configured.
#[must_use]
pub fn open_store(path: Option<&Path>) -> Arc<dyn PreferenceStore> {
    match path {
        Some(path) => Arc::new(JsonFilePreferenceStore::new(path)),
        None => Arc::new(MemoryPreferenceStore::new()),
    }
}
