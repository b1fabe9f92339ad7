use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{source_name}: missing required column '{column}'")]
    MissingColumn { source_name: String, column: String },

    #[error("{source_name} line {line}: {reason}")]
    MalformedInput { source_name: String, line: usize, reason: String },

    #[error("Unknown status '{value}' for subscriber {subscriber_id} in {month}")]
    UnknownStatus { subscriber_id: String, month: String, value: String },

    #[error("Unresolved status for subscriber {subscriber_id} in {month}")]
    UnresolvedStatus { subscriber_id: String, month: String },

    #[error("Stage '{name}' not found")]
    StageNotFound { name: String },

    #[error("Run not initialized")]
    RunNotInitialized,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
