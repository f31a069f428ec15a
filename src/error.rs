//! Error types for the deepfake task service.

use uuid::Uuid;

use crate::tasks::model::{TaskKind, TaskStatus};

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Task registry and lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task {id} not found")]
    NotFound { id: Uuid },

    #[error("Task {id} already exists")]
    AlreadyExists { id: Uuid },

    #[error("Task {id} cannot transition from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Failures of the external analysis collaborators.
///
/// A verdict carrying an explicit `error` is not an `AnalysisError`; it is a
/// regular outcome recorded verbatim on the task.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("No {kind} analyzer is configured")]
    NotConfigured { kind: TaskKind },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Invalid output from {program}: {reason}")]
    InvalidOutput { program: String, reason: String },
}

/// Admission errors, raised before any task record exists.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file part")]
    MissingFile,

    #[error("No selected file")]
    EmptyFilename,

    #[error("Invalid file type. Allowed types: {allowed}")]
    UnsupportedType { kind: TaskKind, allowed: String },

    #[error("File too large: maximum is {limit_mb}MB")]
    TooLarge { limit_mb: usize },

    #[error("Malformed upload: {0}")]
    Malformed(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
