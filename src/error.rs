use std::path::PathBuf;
use thiserror::Error;

/// Why a chunk payload could not be turned into bytes
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("chunk has no ',' separating the metadata prefix from the payload")]
    MissingBoundary,

    #[error("chunk payload is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
}

/// Errors surfaced by session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} is already recording")]
    AlreadyActive(String),

    #[error("no active recording for session {0}")]
    NoActiveSession(String),

    #[error("failed to decode chunk: {0}")]
    Decode(#[from] DecodeError),

    #[error("storage unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write to {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session {0} not found")]
    NotFound(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("service is shutting down; not accepting new recordings")]
    ShuttingDown,
}

impl SessionError {
    /// Stable code reported to clients in error frames and HTTP bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyActive(_) => "ALREADY_ACTIVE",
            Self::NoActiveSession(_) => "NO_ACTIVE_SESSION",
            Self::Decode(_) => "DECODE_ERROR",
            Self::StorageUnavailable { .. } => "STORAGE_UNAVAILABLE",
            Self::WriteFailure { .. } => "WRITE_FAILURE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidFrame(_) => "INVALID_FRAME",
            Self::ShuttingDown => "SHUTTING_DOWN",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
