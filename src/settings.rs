//! User-editable settings persisted as a small JSON document.
//!
//! The document picks the active storage backend, carries the remote
//! credentials and remembers the preferred diagram theme.

use std::{
    io,
    path::{Path, PathBuf},
};

use diagramdb_core::BackendKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("settings file {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(rename = "type", default)]
    pub kind: BackendKind,

    #[serde(default, alias = "supabase")]
    pub remote: RemoteCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteCredentials {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub key: String,
}

/// Diagram theme preference handed to the renderer by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Dark,
    Forest,
    Neutral,
}

pub struct SettingsStore {
    path: PathBuf,
    current: Settings,
}

impl SettingsStore {
    /// Loads the settings file, starting from defaults when it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let current = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Settings::default(),
            Err(source) => return Err(SettingsError::Io { path, source }),
        };
        Ok(Self { path, current })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.current
    }

    pub fn save(&mut self, settings: Settings) -> Result<(), SettingsError> {
        write_atomic(&self.path, &settings)?;
        tracing::info!(
            backend = %settings.storage.kind,
            theme = ?settings.theme,
            "Settings saved"
        );
        self.current = settings;
        Ok(())
    }
}

fn write_atomic(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let io_err = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let body = serde_json::to_string_pretty(settings).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.settings().storage.kind, BackendKind::Embedded);
        assert_eq!(store.settings().theme, Theme::Default);
        assert!(store.settings().storage.remote.url.is_empty());
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("settings.json");
        let mut store = SettingsStore::open(&path).unwrap();

        let mut settings = Settings::default();
        settings.storage.kind = BackendKind::Remote;
        settings.storage.remote = RemoteCredentials {
            url: "https://demo.example.co".into(),
            key: "anon".into(),
        };
        settings.theme = Theme::Forest;
        store.save(settings.clone()).unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.settings(), &settings);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_reads_legacy_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"storage": {"type": "supabase", "supabase": {"url": "https://x.example.co", "key": "k"}}}"#,
        )
        .unwrap();

        let store = SettingsStore::open(&path).unwrap();
        let storage = &store.settings().storage;
        assert_eq!(storage.kind, BackendKind::Remote);
        assert_eq!(storage.remote.url, "https://x.example.co");
        assert_eq!(storage.remote.key, "k");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            SettingsStore::open(&path),
            Err(SettingsError::Parse { .. })
        ));
    }
}
