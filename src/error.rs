use thiserror::Error;

/// Run tracker error types.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Session already running")]
    AlreadyRunning,

    #[error("Session not running")]
    NotRunning,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("State serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;
