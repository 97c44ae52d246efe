use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Topic not found: {0}")]
    UnknownTopic(String),

    #[error("Adding prerequisite would create cycle: {prerequisite} -> {topic}")]
    CycleDetected { topic: String, prerequisite: String },

    #[error("Target retention must be between 0 and 1, got {0}")]
    InvalidTarget(f64),

    #[error("Malformed snapshot '{key}': {reason}")]
    MalformedSnapshot { key: String, reason: String },

    #[error("Invalid problem ID format: {0}")]
    InvalidProblemId(String),

    #[error("No active session")]
    NoActiveSession,

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
