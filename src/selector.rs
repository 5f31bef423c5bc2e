use std::path::PathBuf;

use diagramdb_core::{BackendKind, StorageBackend, StorageError};
use diagramdb_remote::{RemoteSettings, RemoteStore};
use diagramdb_sqlite::EmbeddedStore;

use crate::{config::StorageConfig, settings::StorageSettings};

/// Everything needed to build either backend variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// `None` keeps the embedded store in memory.
    pub database: Option<PathBuf>,
    pub remote: RemoteSettings,
}

impl BackendConfig {
    pub fn embedded(database: Option<PathBuf>) -> Self {
        Self {
            kind: BackendKind::Embedded,
            database,
            remote: RemoteSettings::new("", ""),
        }
    }

    pub fn from_settings(settings: &StorageSettings, storage: &StorageConfig) -> Self {
        Self {
            kind: settings.kind,
            database: Some(storage.database_path()),
            remote: RemoteSettings::new(settings.remote.url.clone(), settings.remote.key.clone())
                .with_table(storage.remote_table.clone())
                .with_timeout(storage.request_timeout()),
        }
    }
}

/// Owns the active backend and rebuilds it whenever the configuration changes.
pub struct StorageSelector {
    config: BackendConfig,
    backend: Option<Box<dyn StorageBackend>>,
    generation: u64,
}

impl StorageSelector {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            backend: None,
            generation: 0,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    /// Number of backend instances constructed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the configuration. Returns `true` if it differed, in which
    /// case the cached backend has been dropped.
    pub fn configure(&mut self, config: BackendConfig) -> bool {
        if config == self.config {
            return false;
        }
        tracing::info!(from = %self.config.kind, to = %config.kind, "Storage configuration changed");
        self.config = config;
        self.invalidate();
        true
    }

    pub fn invalidate(&mut self) {
        if self.backend.take().is_some() {
            tracing::debug!(generation = self.generation, "Storage backend released");
        }
    }

    /// Returns the cached backend, constructing and initialising one first if
    /// needed. A failed `init` caches nothing.
    pub fn active_backend(&mut self) -> Result<&mut dyn StorageBackend, StorageError> {
        let backend = match self.backend.take() {
            Some(backend) => backend,
            None => {
                let mut backend = self.build();
                if let Err(e) = backend.init() {
                    tracing::warn!(kind = %self.config.kind, error = %e, "Storage backend failed to open");
                    return Err(e);
                }
                self.generation += 1;
                tracing::info!(kind = %self.config.kind, generation = self.generation, "Storage backend connected");
                backend
            }
        };
        Ok(&mut **self.backend.insert(backend))
    }

    fn build(&self) -> Box<dyn StorageBackend> {
        match self.config.kind {
            BackendKind::Embedded => match &self.config.database {
                Some(path) => Box::new(EmbeddedStore::new(path.clone())),
                None => Box::new(EmbeddedStore::in_memory()),
            },
            BackendKind::Remote => Box::new(RemoteStore::new(self.config.remote.clone())),
        }
    }
}
