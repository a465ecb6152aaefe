use std::path::PathBuf;

use simdock_protocol::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimdockError {
    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("path escapes workspace root: {}", .0.display())]
    PathEscape(PathBuf),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("snapshot does not exist: {0}")]
    SnapshotMissing(String),

    #[error("no backup exists for this session")]
    BackupMissing,

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimdockError {
    /// Convert to protocol error code and sanitized message.
    pub fn to_error_code(&self) -> (ErrorCode, String) {
        match self {
            SimdockError::UnknownSession(_) => (ErrorCode::UnknownSession, self.to_string()),
            SimdockError::PathEscape(_) => (ErrorCode::PathEscape, self.to_string()),
            SimdockError::NotFound(_) => (ErrorCode::NotFound, self.to_string()),
            SimdockError::SnapshotMissing(_) => (ErrorCode::SnapshotMissing, self.to_string()),
            SimdockError::BackupMissing => (ErrorCode::SnapshotMissing, self.to_string()),
            SimdockError::Serialize(_) => (ErrorCode::InvalidRequest, self.to_string()),
            SimdockError::Io(_) => (ErrorCode::ServerError, "internal I/O error".to_string()),
        }
    }
}
