//! HTTP surface for the browser playground.
//!
//! All storage work runs on the blocking pool behind a single lock on the
//! workspace, so requests are applied one at a time in arrival order.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use diagramdb_core::{ErrorCategory, NewRecord, Record, RecordChanges, RecordId, StorageError};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    settings::Settings,
    templates::{self, Template},
    workspace::{Document, Workspace, WorkspaceError},
};

#[derive(Clone)]
pub struct AppState {
    workspace: Arc<Mutex<Workspace>>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(workspace: Workspace, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            workspace: Arc::new(Mutex::new(workspace)),
            metrics,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("workspace is unavailable after a panic")]
    Poisoned,
    #[error("request task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("metrics are not enabled")]
    MetricsDisabled,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Workspace(WorkspaceError::EmptyContent) => StatusCode::BAD_REQUEST,
            ApiError::Workspace(WorkspaceError::UnknownRecord(_))
            | ApiError::Workspace(WorkspaceError::UnknownTemplate(_))
            | ApiError::Workspace(WorkspaceError::Storage(StorageError::NotFound(_)))
            | ApiError::MetricsDisabled => StatusCode::NOT_FOUND,
            ApiError::Workspace(WorkspaceError::Storage(e)) => match e.category() {
                ErrorCategory::Connection => StatusCode::SERVICE_UNAVAILABLE,
                ErrorCategory::Query | ErrorCategory::Write => StatusCode::BAD_GATEWAY,
            },
            ApiError::Workspace(WorkspaceError::Settings(_))
            | ApiError::Poisoned
            | ApiError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (
            status,
            Json(ErrorBody {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Path ids follow the wire rule: `0` and below name no saved record.
fn record_id(raw: i64) -> Result<RecordId, ApiError> {
    RecordId::from_wire(raw).ok_or(ApiError::Workspace(WorkspaceError::UnknownRecord(RecordId(raw))))
}

async fn with_workspace<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut Workspace) -> Result<T, WorkspaceError> + Send + 'static,
{
    let workspace = state.workspace.clone();
    tokio::task::spawn_blocking(move || {
        let mut guard = workspace.lock().map_err(|_| ApiError::Poisoned)?;
        f(&mut guard).map_err(ApiError::from)
    })
    .await?
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/diagrams", get(list_diagrams).post(create_diagram))
        .route("/diagrams/reload", post(reload_diagrams))
        .route(
            "/diagrams/:id",
            get(get_diagram).put(update_diagram).delete(delete_diagram),
        )
        .route("/document", get(get_document))
        .route("/document/code", put(set_document_code))
        .route("/document/name", put(rename_document))
        .route("/document/new", post(new_document))
        .route("/document/save", post(save_document))
        .route("/document/open/:id", post(open_document))
        .route("/templates", get(list_templates))
        .route("/settings", get(get_settings).put(put_settings))
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(ApiError::MetricsDisabled)
}

async fn list_diagrams(State(state): State<AppState>) -> Result<Json<Vec<Record>>, ApiError> {
    with_workspace(&state, |ws| ws.history()).await.map(Json)
}

async fn create_diagram(
    State(state): State<AppState>,
    Json(body): Json<NewRecord>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let created = with_workspace(&state, move |ws| ws.create(body)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Serialize)]
struct Reloaded {
    count: usize,
}

async fn reload_diagrams(State(state): State<AppState>) -> Result<Json<Reloaded>, ApiError> {
    let count = with_workspace(&state, |ws| ws.reload()).await?;
    Ok(Json(Reloaded { count }))
}

async fn get_diagram(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Record>, ApiError> {
    let id = record_id(id)?;
    with_workspace(&state, move |ws| ws.record(id))
        .await
        .map(Json)
}

async fn update_diagram(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<RecordChanges>,
) -> Result<Json<Record>, ApiError> {
    let id = record_id(id)?;
    with_workspace(&state, move |ws| ws.update(id, body))
        .await
        .map(Json)
}

async fn delete_diagram(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let id = record_id(id)?;
    with_workspace(&state, move |ws| ws.delete(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_document(State(state): State<AppState>) -> Result<Json<Document>, ApiError> {
    with_workspace(&state, |ws| Ok(ws.document())).await.map(Json)
}

#[derive(Deserialize)]
struct CodeBody {
    code: String,
}

async fn set_document_code(
    State(state): State<AppState>,
    Json(body): Json<CodeBody>,
) -> Result<Json<Document>, ApiError> {
    with_workspace(&state, move |ws| {
        ws.set_code(&body.code);
        Ok(ws.document())
    })
    .await
    .map(Json)
}

#[derive(Deserialize)]
struct NameBody {
    name: String,
}

async fn rename_document(
    State(state): State<AppState>,
    Json(body): Json<NameBody>,
) -> Result<Json<Document>, ApiError> {
    with_workspace(&state, move |ws| {
        ws.rename(&body.name)?;
        Ok(ws.document())
    })
    .await
    .map(Json)
}

#[derive(Deserialize, Default)]
struct NewDocumentBody {
    template: Option<String>,
}

async fn new_document(
    State(state): State<AppState>,
    body: Option<Json<NewDocumentBody>>,
) -> Result<Json<Document>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    with_workspace(&state, move |ws| {
        match body.template {
            Some(template) => ws.new_from_template(&template)?,
            None => ws.create_new(),
        }
        Ok(ws.document())
    })
    .await
    .map(Json)
}

async fn save_document(State(state): State<AppState>) -> Result<Json<Record>, ApiError> {
    with_workspace(&state, |ws| ws.save()).await.map(Json)
}

async fn open_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Document>, ApiError> {
    let id = record_id(id)?;
    with_workspace(&state, move |ws| ws.open_record(id))
        .await
        .map(Json)
}

async fn list_templates() -> Json<&'static [Template]> {
    Json(templates::templates())
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, ApiError> {
    with_workspace(&state, |ws| Ok(ws.settings().clone()))
        .await
        .map(Json)
}

async fn put_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    with_workspace(&state, move |ws| {
        ws.apply_settings(settings)?;
        Ok(ws.settings().clone())
    })
    .await
    .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(WorkspaceError::EmptyContent), StatusCode::BAD_REQUEST),
            (
                ApiError::from(WorkspaceError::UnknownRecord(RecordId(3))),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(WorkspaceError::Storage(StorageError::NotFound(RecordId(3)))),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(WorkspaceError::Storage(StorageError::Connection("down".into()))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::from(WorkspaceError::Storage(StorageError::Write("rejected".into()))),
                StatusCode::BAD_GATEWAY,
            ),
            (ApiError::Poisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{}", error);
        }
    }
}
