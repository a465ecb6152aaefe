use serde::{Deserialize, Serialize};

/// Unique identifier for a client session.
pub type SessionId = String;

/// Unique identifier for a background simulation task.
pub type TaskId = String;

/// Error codes for structured error handling at the HTTP boundary.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnknownSession,
    PathEscape,
    NotFound,
    SnapshotMissing,
    InvalidRequest,
    ServerError,
}

/// Lifecycle state of a background task.
///
/// Transitions are one-way: `Running -> Finished` or `Running -> Failed`.
/// `NotFound` is only ever reported for task ids the registry has never seen.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Finished,
    Failed,
    NotFound,
}

/// Point-in-time progress of a background task. Each update from the job
/// replaces the previous one wholesale.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Progress {
    /// Seconds elapsed since the job started.
    pub elapsed_secs: f64,
    /// Completion estimate in [0, 100] when the job reports one.
    #[serde(default)]
    pub percent: Option<f64>,
    pub message: String,
}

impl Progress {
    pub fn queued() -> Self {
        Self {
            elapsed_secs: 0.0,
            percent: None,
            message: "queued".to_string(),
        }
    }
}

/// Recursive workspace listing, grouped by file kind and sorted within
/// each group.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FileListing {
    pub yaml_files: Vec<String>,
    pub csv_files: Vec<String>,
    pub html_files: Vec<String>,
    pub png_files: Vec<String>,
    pub total_files: usize,
}

/// Content of a single workspace file as returned by the read endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum FileContent {
    /// Raw read of a known-binary file: base64 payload plus a MIME hint.
    RawBinary {
        file: String,
        data_b64: String,
        mime: String,
        raw: bool,
    },
    /// Raw read of a text file.
    RawText {
        file: String,
        data: String,
        mime: String,
        raw: bool,
    },
    /// Decoded structured document (YAML parsed to JSON) or plain text.
    Parsed {
        file: String,
        data: serde_json::Value,
    },
}

/// Body for create/replace file requests.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WriteFilePayload {
    pub file_path: String,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

/// Body for snapshot save requests.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SaveSnapshotPayload {
    pub project_name: String,
}

/// Body for snapshot load requests.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoadSnapshotPayload {
    pub name: String,
}

/// Optional body for simulation trigger requests.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TriggerPayload {
    /// Configuration file name inside `project/config/`, defaults to
    /// `base.yaml`.
    #[serde(default)]
    pub config: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TriggerResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// Poll snapshot for a background task. `result` and `files` are present
/// only once the task reached a terminal state.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TaskStatusResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<FileListing>,
}

impl TaskStatusResponse {
    pub fn not_found(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: TaskStatus::NotFound,
            progress: None,
            result: None,
            files: None,
        }
    }
}

/// Generic ok/err outcome for file and snapshot mutations.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OperationOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<FileListing>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SavedListResponse {
    pub dirs: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SweepResponse {
    pub removed: Vec<String>,
}

/// Combined state refresh: workspace listing, active config document, and
/// saved snapshot names.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RefreshResponse {
    pub files: FileListing,
    pub config: serde_json::Value,
    pub saved: Vec<String>,
}
