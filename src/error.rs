use thiserror::Error;

/// Failures talking to the remote store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    /// Remote unreachable or the request never produced a usable response.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("record {0} not found")]
    NotFound(i64),
    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteError {
    /// Errors that should leave the edit queued for the next sweep.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport(_) => true,
            RemoteError::Rejected { status, .. } => *status >= 500 || *status == 429,
            RemoteError::NotFound(_) => false,
        }
    }
}

/// Failures of the local key-value substrate.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("local storage unavailable")]
    Unavailable,
    #[error("failed to read {key}: {reason}")]
    Read { key: String, reason: String },
    #[error("failed to write {key}: {reason}")]
    Write { key: String, reason: String },
    #[error("corrupt value under {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("operation requires connectivity")]
    Offline,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no record for exercise {0}")]
    UnknownExercise(String),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
