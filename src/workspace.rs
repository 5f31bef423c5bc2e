//! The playground controller: one open document plus the saved history,
//! backed by whichever store the user's settings select.

use diagramdb_core::{
    BackendKind, NewRecord, Record, RecordChanges, RecordId, StorageError,
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    cache::RecordCache,
    config::StorageConfig,
    selector::{BackendConfig, StorageSelector},
    settings::{Settings, SettingsError, SettingsStore},
    templates::{self, DEFAULT_DIAGRAM},
};

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("nothing to save: the diagram is empty")]
    EmptyContent,
    #[error("unknown diagram: {0}")]
    UnknownRecord(RecordId),
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// The text editor pane. Only its current value is of interest here.
pub trait Editor: Send {
    fn value(&self) -> String;
    fn set_value(&mut self, text: &str);
}

/// Plain in-process editor buffer.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    text: String,
}

impl Editor for TextBuffer {
    fn value(&self) -> String {
        self.text.clone()
    }

    fn set_value(&mut self, text: &str) {
        self.text = text.to_string();
    }
}

/// Turns diagram text into SVG. Errors carry the renderer's message.
pub trait DiagramRenderer {
    fn render(&self, id: &str, text: &str) -> Result<String, String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// `0` on the wire while the document is unsaved.
    #[serde(serialize_with = "unsaved_as_zero")]
    pub id: Option<RecordId>,
    pub name: String,
    pub code: String,
}

fn unsaved_as_zero<S: serde::Serializer>(id: &Option<RecordId>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(id.map_or(0, RecordId::get))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPreview {
    pub record: Record,
    pub preview: Result<String, String>,
}

fn observe<T>(op: &'static str, kind: BackendKind, result: &Result<T, StorageError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(op, backend = %kind, error = %e, "Storage operation failed");
            "error"
        }
    };
    metrics::counter!(
        "diagramdb_storage_ops_total",
        1,
        "op" => op,
        "backend" => kind.as_str(),
        "outcome" => outcome
    );
}

pub struct Workspace<E: Editor = TextBuffer> {
    storage: StorageConfig,
    settings: SettingsStore,
    selector: StorageSelector,
    cache: RecordCache,
    loaded: bool,
    current: Option<RecordId>,
    name: String,
    editor: E,
}

impl Workspace<TextBuffer> {
    pub fn open(storage: StorageConfig) -> Result<Self, WorkspaceError> {
        Self::with_editor(storage, TextBuffer::default())
    }
}

impl<E: Editor> Workspace<E> {
    pub fn with_editor(storage: StorageConfig, editor: E) -> Result<Self, WorkspaceError> {
        let settings = SettingsStore::open(storage.settings_path())?;
        let selector = StorageSelector::new(BackendConfig::from_settings(
            &settings.settings().storage,
            &storage,
        ));
        Ok(Self {
            storage,
            settings,
            selector,
            cache: RecordCache::new(),
            loaded: false,
            current: None,
            name: UNTITLED.to_string(),
            editor,
        })
    }

    pub fn settings(&self) -> &Settings {
        self.settings.settings()
    }

    pub fn selector(&self) -> &StorageSelector {
        &self.selector
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn document(&self) -> Document {
        Document {
            id: self.current,
            name: self.name.clone(),
            code: self.editor.value(),
        }
    }

    pub fn set_code(&mut self, code: &str) {
        self.editor.set_value(code);
    }

    fn show(&mut self, id: Option<RecordId>, name: &str, code: &str) {
        self.current = id;
        self.name = name.to_string();
        self.editor.set_value(code);
    }

    /// Rebuilds the cache from the active backend without touching the open
    /// document.
    pub fn reload(&mut self) -> Result<usize, WorkspaceError> {
        self.loaded = false;
        let backend = self.selector.active_backend()?;
        let kind = backend.kind();
        let result = self.cache.load_from(backend);
        observe("get_all", kind, &result);
        let count = result?;
        self.loaded = true;
        metrics::gauge!("diagramdb_cache_records", count as f64);
        Ok(count)
    }

    fn ensure_loaded(&mut self) -> Result<(), WorkspaceError> {
        if !self.loaded {
            self.reload()?;
        }
        Ok(())
    }

    /// Start-up load: refresh the cache and open the newest diagram, or the
    /// default example when there is none.
    pub fn load_all(&mut self) -> Result<(), WorkspaceError> {
        self.reload()?;
        match self.cache.first_loaded().cloned() {
            Some(record) => self.show(Some(record.id), &record.name, &record.code),
            None => self.show(None, UNTITLED, DEFAULT_DIAGRAM),
        }
        Ok(())
    }

    pub fn create_new(&mut self) {
        self.show(None, UNTITLED, "");
    }

    pub fn new_from_template(&mut self, template_id: &str) -> Result<(), WorkspaceError> {
        let template = templates::template(template_id)
            .ok_or_else(|| WorkspaceError::UnknownTemplate(template_id.to_string()))?;
        self.show(None, template.name, template.code);
        Ok(())
    }

    /// Saves the open document: an update when it already has an id, a
    /// create otherwise.
    pub fn save(&mut self) -> Result<Record, WorkspaceError> {
        let code = self.editor.value().trim().to_string();
        if code.is_empty() {
            tracing::warn!("Refusing to save an empty diagram");
            return Err(WorkspaceError::EmptyContent);
        }
        let name = self.name.clone();
        let record = match self.current {
            Some(id) => self.update(id, RecordChanges::new(name, code))?,
            None => self.create(NewRecord::new(name, code))?,
        };
        self.current = Some(record.id);
        Ok(record)
    }

    /// Renames the open document. A saved document keeps its stored code and
    /// only the name is written; unsaved editor changes stay in the editor.
    /// An unsaved document with content is saved, which is how it first gets
    /// an id.
    pub fn rename(&mut self, name: &str) -> Result<Option<Record>, WorkspaceError> {
        let name = name.trim();
        let name = if name.is_empty() { UNTITLED } else { name }.to_string();
        match self.current {
            Some(id) => {
                self.ensure_loaded()?;
                let stored = self
                    .cache
                    .get(id)
                    .cloned()
                    .ok_or(WorkspaceError::UnknownRecord(id))?;
                let renamed = self.persist_update(id, RecordChanges::new(name, stored.code))?;
                self.name = renamed.name.clone();
                Ok(Some(renamed))
            }
            None => {
                self.name = name;
                if self.editor.value().trim().is_empty() {
                    return Ok(None);
                }
                self.save().map(Some)
            }
        }
    }

    pub fn open_record(&mut self, id: RecordId) -> Result<Document, WorkspaceError> {
        self.ensure_loaded()?;
        let record = self
            .cache
            .get(id)
            .cloned()
            .ok_or(WorkspaceError::UnknownRecord(id))?;
        self.show(Some(record.id), &record.name, &record.code);
        Ok(self.document())
    }

    pub fn record(&mut self, id: RecordId) -> Result<Record, WorkspaceError> {
        self.ensure_loaded()?;
        self.cache
            .get(id)
            .cloned()
            .ok_or(WorkspaceError::UnknownRecord(id))
    }

    pub fn create(&mut self, record: NewRecord) -> Result<Record, WorkspaceError> {
        if record.code.trim().is_empty() {
            return Err(WorkspaceError::EmptyContent);
        }
        self.ensure_loaded()?;
        let backend = self.selector.active_backend()?;
        let kind = backend.kind();
        let result = backend.add(&record);
        observe("add", kind, &result);
        let created = result?;
        self.cache.upsert_local(created.clone());
        metrics::gauge!("diagramdb_cache_records", self.cache.len() as f64);
        tracing::info!(id = %created.id, name = %created.name, "Diagram created");
        Ok(created)
    }

    pub fn update(&mut self, id: RecordId, changes: RecordChanges) -> Result<Record, WorkspaceError> {
        if changes.code.trim().is_empty() {
            return Err(WorkspaceError::EmptyContent);
        }
        let updated = self.persist_update(id, changes)?;
        if self.current == Some(id) {
            self.show(Some(id), &updated.name, &updated.code);
        }
        Ok(updated)
    }

    /// Writes the changes to the backend and mirrors them in the cache,
    /// leaving the open document alone.
    fn persist_update(&mut self, id: RecordId, changes: RecordChanges) -> Result<Record, WorkspaceError> {
        self.ensure_loaded()?;
        let backend = self.selector.active_backend()?;
        let kind = backend.kind();
        let result = backend.update(id, &changes);
        observe("update", kind, &result);
        result?;

        let updated = Record::new(id, changes.name, changes.code);
        self.cache.upsert_local(updated.clone());
        tracing::info!(%id, "Diagram updated");
        Ok(updated)
    }

    /// Deletes a saved diagram. Deleting the open one leaves a fresh document.
    pub fn delete(&mut self, id: RecordId) -> Result<(), WorkspaceError> {
        self.ensure_loaded()?;
        let backend = self.selector.active_backend()?;
        let kind = backend.kind();
        let result = backend.delete(id);
        observe("delete", kind, &result);
        result?;

        self.cache.remove_local(id);
        metrics::gauge!("diagramdb_cache_records", self.cache.len() as f64);
        if self.current == Some(id) {
            self.create_new();
        }
        tracing::info!(%id, "Diagram deleted");
        Ok(())
    }

    /// Saved diagrams in history-list order.
    pub fn history(&mut self) -> Result<Vec<Record>, WorkspaceError> {
        self.ensure_loaded()?;
        Ok(self.cache.display_order().cloned().collect())
    }

    pub fn history_previews(
        &mut self,
        renderer: &dyn DiagramRenderer,
    ) -> Result<Vec<HistoryPreview>, WorkspaceError> {
        Ok(self
            .history()?
            .into_iter()
            .map(|record| {
                let preview = renderer.render(&format!("preview-{}", record.id), &record.code);
                HistoryPreview { record, preview }
            })
            .collect())
    }

    /// Persists new settings. A change of backend drops the cache and
    /// reloads everything from the newly selected store.
    ///
    /// Ids only mean something within one backend, so the open document is
    /// detached from its record before the reload. If the reload fails, the
    /// text stays in the editor and a later save creates a new record.
    pub fn apply_settings(&mut self, settings: Settings) -> Result<(), WorkspaceError> {
        let config = BackendConfig::from_settings(&settings.storage, &self.storage);
        self.settings.save(settings)?;
        if self.selector.configure(config) {
            self.cache.clear();
            self.loaded = false;
            self.current = None;
            self.load_all()?;
        }
        Ok(())
    }
}
