//! Persisted bridge settings.
//!
//! One JSON document holding the telemetry credentials and the hub access
//! token. Loaded once at startup; every mutation rewrites the whole file.
//! Credentials are stored in clear -- the document lives in the bridge's
//! private data directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// File name of the settings document inside the data directory.
pub const SETTINGS_FILE: &str = "settings.json";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

// ── Settings ────────────────────────────────────────────────────────

/// The persisted key-value record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub email: Option<String>,
    pub password: Option<String>,
    pub hub_token: Option<String>,
}

impl Settings {
    /// True when every field required to run a bridge cycle is present and
    /// non-empty.
    pub fn is_complete(&self) -> bool {
        [&self.email, &self.password, &self.hub_token]
            .iter()
            .all(|field| matches!(field, Some(v) if !v.is_empty()))
    }
}

// ── SettingsStore ───────────────────────────────────────────────────

/// Owns the settings document on disk.
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load the settings document, or start empty when the file is absent.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(SETTINGS_FILE);
        let settings = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings document yet");
                Settings::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_email(&mut self, email: String) -> Result<(), ConfigError> {
        self.settings.email = Some(email);
        self.save()
    }

    pub fn set_password(&mut self, password: String) -> Result<(), ConfigError> {
        self.settings.password = Some(password);
        self.save()
    }

    pub fn set_hub_token(&mut self, token: String) -> Result<(), ConfigError> {
        self.settings.hub_token = Some(token);
        self.save()
    }

    /// Rewrite the whole document.
    fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.settings)?)?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_loads_empty_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::load(dir.path()).expect("load");

        assert_eq!(*store.settings(), Settings::default());
        assert!(!store.settings().is_complete());
    }

    #[test]
    fn mutations_rewrite_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");

        let mut store = SettingsStore::load(dir.path()).expect("load");
        store.set_email("user@example.com".into()).expect("set email");
        store.set_password("hunter2".into()).expect("set password");
        store.set_hub_token("hub-tok".into()).expect("set token");
        assert!(store.settings().is_complete());

        let reloaded = SettingsStore::load(dir.path()).expect("reload");
        assert_eq!(reloaded.settings(), store.settings());
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "email": "user@example.com", "theme": "dark" }"#,
        )
        .expect("write");

        let store = SettingsStore::load(dir.path()).expect("load");
        assert_eq!(store.settings().email.as_deref(), Some("user@example.com"));
        assert!(store.settings().hub_token.is_none());
    }

    #[test]
    fn empty_strings_do_not_count_as_complete() {
        let settings = Settings {
            email: Some("user@example.com".into()),
            password: Some(String::new()),
            hub_token: Some("hub-tok".into()),
        };
        assert!(!settings.is_complete());
    }

    #[test]
    fn corrupt_document_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ not json").expect("write");

        let result = SettingsStore::load(dir.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
