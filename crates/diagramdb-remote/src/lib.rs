//! Remote storage backend: a single table on a hosted Postgres service,
//! reached through its PostgREST HTTP interface.
//!
//! Every request is authenticated with the project's access key, sent both
//! as `apikey` and as a bearer token. Failed calls are reported immediately
//! with the service's response body; nothing is retried.

use std::time::Duration;

use diagramdb_core::{
    BackendKind, NewRecord, Record, RecordChanges, RecordId, StorageBackend, StorageError,
};
use reqwest::{
    blocking::{Client, RequestBuilder},
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Url,
};

pub const DEFAULT_TABLE: &str = "diagrams";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub endpoint: String,
    pub access_key: String,
    pub table: String,
    pub timeout: Duration,
}

impl RemoteSettings {
    pub fn new(endpoint: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            table: DEFAULT_TABLE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<endpoint>/rest/v1/<table>`, validated.
    pub fn table_url(&self) -> Result<Url, StorageError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(StorageError::Connection("remote endpoint is not configured".into()));
        }
        let base = Url::parse(endpoint)
            .map_err(|e| StorageError::Connection(format!("invalid remote endpoint {:?}: {}", endpoint, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(StorageError::Connection(format!(
                "unsupported remote endpoint scheme: {}",
                base.scheme()
            )));
        }
        if self.table.is_empty() || !self.table.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(StorageError::Connection(format!("invalid table name: {:?}", self.table)));
        }
        let joined = format!("{}/rest/v1/{}", endpoint.trim_end_matches('/'), self.table);
        Url::parse(&joined).map_err(|e| StorageError::Connection(e.to_string()))
    }
}

struct Session {
    client: Client,
    table_url: Url,
}

pub struct RemoteStore {
    settings: RemoteSettings,
    session: Option<Session>,
}

impl RemoteStore {
    pub fn new(settings: RemoteSettings) -> Self {
        Self {
            settings,
            session: None,
        }
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> Result<&Session, StorageError> {
        self.session.as_ref().ok_or(StorageError::NotInitialized)
    }

    fn auth_headers(&self) -> Result<HeaderMap, StorageError> {
        let key = self.settings.access_key.trim();
        if key.is_empty() {
            return Err(StorageError::Connection("remote access key is not configured".into()));
        }
        let malformed = |_| StorageError::Connection("remote access key contains invalid characters".into());

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(key).map_err(malformed)?);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", key)).map_err(malformed)?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    fn by_id(builder: RequestBuilder, id: RecordId) -> RequestBuilder {
        builder.query(&[("id", format!("eq.{}", id))])
    }
}

/// Sends the request and decodes the JSON row array, turning transport
/// failures and non-2xx responses into the error class chosen by `fail`.
fn send_rows(
    request: RequestBuilder,
    fail: fn(String) -> StorageError,
) -> Result<Vec<Record>, StorageError> {
    let response = request.send().map_err(|e| fail(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|e| format!("<response body could not be read: {}>", e));
        return Err(fail(format!("{}: {}", status, body)));
    }
    response
        .json::<Vec<Record>>()
        .map_err(|e| fail(format!("unexpected response body: {}", e)))
}

impl StorageBackend for RemoteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn init(&mut self) -> Result<(), StorageError> {
        if self.session.is_some() {
            return Ok(());
        }
        let table_url = self.settings.table_url()?;
        // A zero timeout means requests may take as long as they need.
        let timeout = Some(self.settings.timeout).filter(|t| !t.is_zero());
        let client = Client::builder()
            .default_headers(self.auth_headers()?)
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tracing::debug!(url = %table_url, "Remote store ready");
        self.session = Some(Session { client, table_url });
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Record>, StorageError> {
        let session = self.session()?;
        let request = session
            .client
            .get(session.table_url.clone())
            .query(&[("select", "*"), ("order", "id.desc")]);
        let records = send_rows(request, StorageError::Query)?;
        tracing::debug!(count = records.len(), "Remote store loaded all records");
        Ok(records)
    }

    fn add(&mut self, record: &NewRecord) -> Result<Record, StorageError> {
        let session = self.session()?;
        let request = session
            .client
            .post(session.table_url.clone())
            .header("Prefer", RETURN_REPRESENTATION)
            .json(record);
        let created = send_rows(request, StorageError::Write)?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::Write("insert did not return the created row".into()))?;
        tracing::debug!(id = %created.id, "Remote store added record");
        Ok(created)
    }

    fn update(&mut self, id: RecordId, changes: &RecordChanges) -> Result<(), StorageError> {
        let session = self.session()?;
        let request = Self::by_id(session.client.patch(session.table_url.clone()), id)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(changes);
        if send_rows(request, StorageError::Write)?.is_empty() {
            return Err(StorageError::NotFound(id));
        }
        tracing::debug!(%id, "Remote store updated record");
        Ok(())
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StorageError> {
        let session = self.session()?;
        let request = Self::by_id(session.client.delete(session.table_url.clone()), id)
            .header("Prefer", RETURN_REPRESENTATION);
        if send_rows(request, StorageError::Write)?.is_empty() {
            return Err(StorageError::NotFound(id));
        }
        tracing::debug!(%id, "Remote store deleted record");
        Ok(())
    }
}
