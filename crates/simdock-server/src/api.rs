//! REST handlers for the workspace server.
//!
//! Boundary policy: unknown sessions and missing files/snapshots/tasks map
//! to 404-class responses, path escapes to 400, everything else to 500.
//! Failed background jobs are not transport errors; they surface through
//! the status poll body.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post};
use serde::Deserialize;
use serde_json::{Value, json};

use libsimdock::engine::SimulationEngine;
use libsimdock::{SessionManager, SimdockError, SnapshotStore, TaskOrchestrator, store, sweep};
use simdock_protocol::{
    CreateSessionResponse, ErrorCode, FileContent, LoadSnapshotPayload, OperationOutcome,
    RefreshResponse, SaveSnapshotPayload, SavedListResponse, SweepResponse, TaskStatus,
    TaskStatusResponse, TriggerPayload, TriggerResponse, WriteFilePayload,
};

use crate::config::ServerConfig;

pub struct AppState {
    pub sessions: SessionManager,
    pub snapshots: SnapshotStore,
    pub orchestrator: TaskOrchestrator,
}

impl AppState {
    pub fn new(
        config: &ServerConfig,
        engine: Arc<dyn SimulationEngine>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            sessions: SessionManager::new(config.sessions_dir(), config.template_dir.clone())?,
            snapshots: SnapshotStore::new(config.saved_dir())?,
            orchestrator: TaskOrchestrator::new(engine),
        })
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/session", post(create_session))
        .route("/api/session/{id}", delete(end_session))
        .route("/api/saved", get(list_saved))
        .route("/api/saved/{name}", delete(delete_saved))
        .route("/api/simulate/status/{task_id}", get(task_status))
        .route("/api/temp/sweep", post(sweep_temp))
        .route("/api/temp/sweep_all", post(sweep_temp_all))
        .route("/api/{id}/config", get(get_config))
        .route("/api/{id}/refresh", get(refresh))
        .route("/api/{id}/library/files", get(list_files))
        .route(
            "/api/{id}/library/file",
            get(read_file)
                .post(write_file)
                .put(write_file)
                .delete(delete_file),
        )
        .route("/api/{id}/library/save", post(save_snapshot))
        .route("/api/{id}/saved/load", post(load_snapshot))
        .route("/api/{id}/saved/restore", post(restore_backup))
        .route("/api/{id}/simulate/trigger", post(trigger_simulation))
        .route("/api/{id}/temp", delete(clear_temp))
        .with_state(state)
}

fn http_error(e: SimdockError) -> (StatusCode, String) {
    let (code, message) = e.to_error_code();
    let status = match code {
        ErrorCode::UnknownSession | ErrorCode::NotFound | ErrorCode::SnapshotMissing => {
            StatusCode::NOT_FOUND
        }
        ErrorCode::PathEscape | ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, message)
}

fn unknown_session(id: &str) -> (StatusCode, String) {
    http_error(SimdockError::UnknownSession(id.to_string()))
}

async fn require_root(state: &AppState, id: &str) -> Result<PathBuf, (StatusCode, String)> {
    state
        .sessions
        .root_for(id)
        .await
        .ok_or_else(|| unknown_session(id))
}

// -- Sessions ------------------------------------------------------------

async fn create_session(State(state): State<Arc<AppState>>) -> ApiResult<CreateSessionResponse> {
    let session_id = state.sessions.create().await.map_err(http_error)?;
    Ok(Json(CreateSessionResponse { session_id }))
}

async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    if !state.sessions.has_session(&id).await {
        return Err(unknown_session(&id));
    }
    state.sessions.end(&id).await;
    Ok(Json(json!({"status": "ended"})))
}

// -- Library files -------------------------------------------------------

#[derive(Deserialize)]
struct ReadQuery {
    path: String,
    #[serde(default)]
    raw: bool,
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let root = require_root(&state, &id).await?;
    Ok(Json(json!({"files": store::scan_files(&root)})))
}

async fn read_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ReadQuery>,
) -> ApiResult<FileContent> {
    let root = require_root(&state, &id).await?;
    let content = store::read_file(&root, &query.path, query.raw).map_err(http_error)?;
    state.sessions.set_last_selected(&id, &query.path).await;
    Ok(Json(content))
}

async fn write_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<WriteFilePayload>,
) -> ApiResult<OperationOutcome> {
    let root = require_root(&state, &id).await?;
    store::write_file(&root, payload.file_path.trim(), payload.content.as_ref())
        .map_err(http_error)?;
    Ok(Json(OperationOutcome {
        ok: true,
        message: None,
        files: Some(store::scan_files(&root)),
    }))
}

#[derive(Deserialize)]
struct DeleteQuery {
    file_path: String,
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<OperationOutcome> {
    let root = require_root(&state, &id).await?;
    let ok = store::delete_file(&root, &query.file_path);
    Ok(Json(OperationOutcome {
        ok,
        message: None,
        files: Some(store::scan_files(&root)),
    }))
}

// -- Snapshots -----------------------------------------------------------

async fn save_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<SaveSnapshotPayload>,
) -> ApiResult<OperationOutcome> {
    if payload.project_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "missing project_name".to_string()));
    }
    let root = require_root(&state, &id).await?;
    let dest = state
        .snapshots
        .save(&root, &payload.project_name)
        .map_err(http_error)?;
    Ok(Json(OperationOutcome {
        ok: true,
        message: Some(dest.to_string_lossy().into_owned()),
        files: None,
    }))
}

async fn list_saved(State(state): State<Arc<AppState>>) -> ApiResult<SavedListResponse> {
    Ok(Json(SavedListResponse {
        dirs: state.snapshots.list(),
    }))
}

async fn load_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<LoadSnapshotPayload>,
) -> ApiResult<OperationOutcome> {
    let root = require_root(&state, &id).await?;
    state
        .snapshots
        .load(&root, &payload.name)
        .map_err(http_error)?;
    Ok(Json(OperationOutcome {
        ok: true,
        message: Some(format!("loaded '{}'", payload.name)),
        files: Some(store::scan_files(&root)),
    }))
}

async fn restore_backup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<OperationOutcome> {
    let root = require_root(&state, &id).await?;
    state.snapshots.restore_backup(&root).map_err(http_error)?;
    Ok(Json(OperationOutcome {
        ok: true,
        message: None,
        files: Some(store::scan_files(&root)),
    }))
}

async fn delete_saved(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<OperationOutcome> {
    let ok = state.snapshots.delete(&name).map_err(http_error)?;
    let message = if ok {
        format!("deleted '{name}'")
    } else {
        "snapshot does not exist".to_string()
    };
    Ok(Json(OperationOutcome {
        ok,
        message: Some(message),
        files: None,
    }))
}

// -- Simulation ----------------------------------------------------------

async fn trigger_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Option<Json<TriggerPayload>>,
) -> ApiResult<TriggerResponse> {
    let Some((root, handles)) = state.sessions.begin_job(&id).await else {
        return Err(unknown_session(&id));
    };
    let config = payload.and_then(|Json(p)| p.config);
    let task_id = state.orchestrator.launch(&id, root, config, handles);
    Ok(Json(TriggerResponse {
        task_id,
        status: TaskStatus::Running,
    }))
}

async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Json<TaskStatusResponse> {
    Json(state.orchestrator.status(&task_id))
}

// -- Temp area -----------------------------------------------------------

async fn clear_temp(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    let ok = state.sessions.clear_temp(&id).await;
    Json(json!({"ok": ok}))
}

async fn sweep_temp(State(state): State<Arc<AppState>>) -> Json<SweepResponse> {
    let live = state.sessions.live_dir_names().await;
    let removed = sweep::sweep_unused(state.sessions.temp_dir(), &live);
    Json(SweepResponse { removed })
}

async fn sweep_temp_all(State(state): State<Arc<AppState>>) -> Json<SweepResponse> {
    let removed = sweep::sweep_all(state.sessions.temp_dir());
    Json(SweepResponse { removed })
}

// -- Convenience reads ---------------------------------------------------

/// Parsed active configuration document, or an empty document when the
/// session has none yet.
async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let root = require_root(&state, &id).await?;
    let config = match store::read_file(&root, "project/config/base.yaml", false) {
        Ok(FileContent::Parsed { data, .. }) => data,
        _ => json!({}),
    };
    Ok(Json(config))
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<RefreshResponse> {
    let root = require_root(&state, &id).await?;
    let config = match store::read_file(&root, "project/config/base.yaml", false) {
        Ok(FileContent::Parsed { data, .. }) => data,
        _ => json!({}),
    };
    Ok(Json(RefreshResponse {
        files: store::scan_files(&root),
        config,
        saved: state.snapshots.list(),
    }))
}
