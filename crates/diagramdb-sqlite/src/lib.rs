//! Embedded storage backend: one SQLite file holding the `diagrams` table.

use std::path::{Path, PathBuf};

use diagramdb_core::{
    BackendKind, NewRecord, Record, RecordChanges, RecordId, StorageBackend, StorageError,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Schema version recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

// Every statement must stay idempotent: an upgrade can resume on a file that
// was only partially initialised.
const SCHEMA_V1: &str = "
    CREATE TABLE IF NOT EXISTS diagrams (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        code TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_diagrams_name ON diagrams(name);

    CREATE INDEX IF NOT EXISTS idx_diagrams_code ON diagrams(code);
";

enum Location {
    File(PathBuf),
    Memory,
}

pub struct EmbeddedStore {
    location: Location,
    conn: Option<Connection>,
}

impl EmbeddedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            conn: None,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn conn(&self) -> Result<&Connection, StorageError> {
        self.conn.as_ref().ok_or(StorageError::NotInitialized)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection, StorageError> {
        self.conn.as_mut().ok_or(StorageError::NotInitialized)
    }

    fn open_connection(&self) -> Result<Connection, StorageError> {
        match &self.location {
            Location::Memory => Connection::open_in_memory(),
            Location::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StorageError::Connection(format!("cannot create {}: {}", parent.display(), e))
                    })?;
                }
                Connection::open(path)
            }
        }
        .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn upgrade_schema(conn: &mut Connection) -> Result<(), StorageError> {
        let current: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if current > SCHEMA_VERSION {
            return Err(StorageError::Connection(format!(
                "database schema version {} is newer than supported version {}",
                current, SCHEMA_VERSION
            )));
        }
        if current == SCHEMA_VERSION {
            return Ok(());
        }

        let tx = conn
            .transaction()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tx.execute_batch(SCHEMA_V1)
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tx.commit()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!(from = current, to = SCHEMA_VERSION, "Embedded store schema upgraded");
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        self.conn()?
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    pub fn get(&self, id: RecordId) -> Result<Option<Record>, StorageError> {
        self.conn()?
            .query_row(
                "SELECT id, name, code FROM diagrams WHERE id = ?1",
                params![id.get()],
                row_to_record,
            )
            .optional()
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    /// Lookup through the non-unique `name` index.
    pub fn find_by_name(&self, name: &str) -> Result<Vec<Record>, StorageError> {
        self.select_where("SELECT id, name, code FROM diagrams WHERE name = ?1 ORDER BY id DESC", name)
    }

    /// Lookup through the non-unique `code` index.
    pub fn find_by_code(&self, code: &str) -> Result<Vec<Record>, StorageError> {
        self.select_where("SELECT id, name, code FROM diagrams WHERE code = ?1 ORDER BY id DESC", code)
    }

    fn select_where(&self, sql: &str, value: &str) -> Result<Vec<Record>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let rows = stmt
            .query_map(params![value], row_to_record)
            .map_err(|e| StorageError::Query(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    /// Removes every record. Ids keep counting up afterwards.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        let removed = self
            .conn_mut()?
            .execute("DELETE FROM diagrams", [])
            .map_err(|e| StorageError::Write(e.to_string()))?;
        tracing::debug!(removed, "Embedded store cleared");
        Ok(())
    }

    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            tracing::debug!("Embedded store closed");
        }
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: RecordId(row.get(0)?),
        name: row.get(1)?,
        code: row.get(2)?,
    })
}

impl StorageBackend for EmbeddedStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn init(&mut self) -> Result<(), StorageError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let mut conn = self.open_connection()?;
        Self::upgrade_schema(&mut conn)?;
        self.conn = Some(conn);
        tracing::debug!(path = ?self.path(), "Embedded store opened");
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Record>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, code FROM diagrams ORDER BY id DESC")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let rows = stmt
            .query_map([], row_to_record)
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let records = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Query(e.to_string()))?;
        tracing::debug!(count = records.len(), "Embedded store loaded all records");
        Ok(records)
    }

    fn add(&mut self, record: &NewRecord) -> Result<Record, StorageError> {
        let conn = self.conn_mut()?;
        conn.execute(
            "INSERT INTO diagrams (name, code) VALUES (?1, ?2)",
            params![record.name, record.code],
        )
        .map_err(|e| StorageError::Write(e.to_string()))?;
        let id = RecordId(conn.last_insert_rowid());
        tracing::debug!(%id, "Embedded store added record");
        Ok(Record::new(id, record.name.clone(), record.code.clone()))
    }

    fn update(&mut self, id: RecordId, changes: &RecordChanges) -> Result<(), StorageError> {
        let tx = self
            .conn_mut()?
            .transaction()
            .map_err(|e| StorageError::Write(e.to_string()))?;
        let updated = tx
            .execute(
                "UPDATE diagrams SET name = ?1, code = ?2 WHERE id = ?3",
                params![changes.name, changes.code, id.get()],
            )
            .map_err(|e| StorageError::Write(e.to_string()))?;
        if updated == 0 {
            return Err(StorageError::NotFound(id));
        }
        tx.commit().map_err(|e| StorageError::Write(e.to_string()))?;
        tracing::debug!(%id, "Embedded store updated record");
        Ok(())
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StorageError> {
        let tx = self
            .conn_mut()?
            .transaction()
            .map_err(|e| StorageError::Write(e.to_string()))?;
        let deleted = tx
            .execute("DELETE FROM diagrams WHERE id = ?1", params![id.get()])
            .map_err(|e| StorageError::Write(e.to_string()))?;
        if deleted == 0 {
            return Err(StorageError::NotFound(id));
        }
        tx.commit().map_err(|e| StorageError::Write(e.to_string()))?;
        tracing::debug!(%id, "Embedded store deleted record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_memory() -> EmbeddedStore {
        let mut store = EmbeddedStore::in_memory();
        store.init().unwrap();
        store
    }

    fn index_names(store: &EmbeddedStore) -> Vec<String> {
        let conn = store.conn().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'diagrams' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_embedded_basic_lifecycle() {
        let mut store = open_memory();
        assert!(store.get_all().unwrap().is_empty());

        let created = store
            .add(&NewRecord::new("Flow A", "graph TD; A-->B"))
            .unwrap();
        assert_eq!(created, Record::new(RecordId(1), "Flow A", "graph TD; A-->B"));
        assert_eq!(store.get_all().unwrap(), vec![created.clone()]);

        store
            .update(RecordId(1), &RecordChanges::new("Flow A2", "graph LR; A-->C"))
            .unwrap();
        assert_eq!(
            store.get(RecordId(1)).unwrap(),
            Some(Record::new(RecordId(1), "Flow A2", "graph LR; A-->C"))
        );

        store.delete(RecordId(1)).unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_embedded_get_all_is_newest_first() {
        let mut store = open_memory();
        for name in ["one", "two", "three"] {
            store.add(&NewRecord::new(name, "graph TD")).unwrap();
        }
        let ids: Vec<i64> = store.get_all().unwrap().iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_embedded_ids_are_not_reused() {
        let mut store = open_memory();
        let first = store.add(&NewRecord::new("a", "x")).unwrap();
        store.delete(first.id).unwrap();
        let second = store.add(&NewRecord::new("b", "y")).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_embedded_missing_id_is_rejected() {
        let mut store = open_memory();
        let err = store
            .update(RecordId(42), &RecordChanges::new("n", "c"))
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(RecordId(42))));

        let err = store.delete(RecordId(42)).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(RecordId(42))));
    }

    #[test]
    fn test_embedded_requires_init() {
        let mut store = EmbeddedStore::in_memory();
        assert!(matches!(store.get_all(), Err(StorageError::NotInitialized)));
        assert!(matches!(
            store.add(&NewRecord::new("a", "b")),
            Err(StorageError::NotInitialized)
        ));
    }

    #[test]
    fn test_embedded_schema_creates_indexes() {
        let store = open_memory();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert_eq!(index_names(&store), vec!["idx_diagrams_code", "idx_diagrams_name"]);
    }

    #[test]
    fn test_embedded_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("diagrams.db");

        let mut store = EmbeddedStore::new(&path);
        store.init().unwrap();
        store.add(&NewRecord::new("kept", "graph TD")).unwrap();
        store.close();
        assert!(!store.is_open());

        let mut reopened = EmbeddedStore::new(&path);
        reopened.init().unwrap();
        let all = reopened.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "kept");
    }

    #[test]
    fn test_embedded_upgrade_resumes_partial_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE diagrams (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, code TEXT NOT NULL);
                 CREATE INDEX idx_diagrams_name ON diagrams(name);
                 INSERT INTO diagrams (name, code) VALUES ('old', 'graph TD');",
            )
            .unwrap();
        }

        let mut store = EmbeddedStore::new(&path);
        store.init().unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert_eq!(index_names(&store), vec!["idx_diagrams_code", "idx_diagrams_name"]);
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_embedded_refuses_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1).unwrap();
        }

        let mut store = EmbeddedStore::new(&path);
        let err = store.init().unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
        assert!(!store.is_open());
    }

    #[test]
    fn test_embedded_index_lookups() {
        let mut store = open_memory();
        store.add(&NewRecord::new("shared", "graph TD")).unwrap();
        store.add(&NewRecord::new("shared", "sequenceDiagram")).unwrap();
        store.add(&NewRecord::new("other", "graph TD")).unwrap();

        let by_name = store.find_by_name("shared").unwrap();
        assert_eq!(by_name.iter().map(|r| r.id.get()).collect::<Vec<_>>(), vec![2, 1]);

        let by_code = store.find_by_code("graph TD").unwrap();
        assert_eq!(by_code.iter().map(|r| r.id.get()).collect::<Vec<_>>(), vec![3, 1]);

        assert!(store.find_by_name("missing").unwrap().is_empty());
    }

    #[test]
    fn test_embedded_clear() {
        let mut store = open_memory();
        store.add(&NewRecord::new("a", "x")).unwrap();
        store.add(&NewRecord::new("b", "y")).unwrap();
        store.clear().unwrap();
        assert!(store.get_all().unwrap().is_empty());
        let next = store.add(&NewRecord::new("c", "z")).unwrap();
        assert_eq!(next.id, RecordId(3));
    }
}
