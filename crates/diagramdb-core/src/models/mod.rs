use std::fmt;

use serde::{Deserialize, Serialize};

pub mod write;

/// Backend-assigned identifier of a saved diagram.
///
/// Ids are positive once assigned and never change for the lifetime of the
/// record. Documents that were never saved carry no id at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl RecordId {
    pub fn get(self) -> i64 {
        self.0
    }

    /// Interprets a raw wire id, where `0` (or anything below) means "unsaved".
    pub fn from_wire(raw: i64) -> Option<Self> {
        (raw > 0).then_some(RecordId(raw))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(raw: i64) -> Self {
        RecordId(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub code: String,
}

impl Record {
    pub fn new(id: RecordId, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            code: code.into(),
        }
    }
}

/// Which storage variant a configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    #[serde(alias = "indexed-db")]
    Embedded,
    #[serde(alias = "supabase")]
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Embedded => "embedded",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_from_wire() {
        assert_eq!(RecordId::from_wire(0), None);
        assert_eq!(RecordId::from_wire(-3), None);
        assert_eq!(RecordId::from_wire(7), Some(RecordId(7)));
    }

    #[test]
    fn test_record_serializes_with_plain_id() {
        let record = Record::new(RecordId(1), "Flow A", "graph TD; A-->B");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "name": "Flow A", "code": "graph TD; A-->B"}));
    }

    #[test]
    fn test_backend_kind_accepts_legacy_names() {
        let kind: BackendKind = serde_json::from_str("\"indexed-db\"").unwrap();
        assert_eq!(kind, BackendKind::Embedded);
        let kind: BackendKind = serde_json::from_str("\"supabase\"").unwrap();
        assert_eq!(kind, BackendKind::Remote);
        assert_eq!(serde_json::to_string(&BackendKind::Remote).unwrap(), "\"remote\"");
    }
}
