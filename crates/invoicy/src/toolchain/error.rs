use thiserror::Error;

use crate::extraction::{ExtractionError, TaskKind};

/// Why a work item produced no record.
#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("Task '{task}' failed: {source}")]
    Task {
        task: TaskKind,
        #[source]
        source: ExtractionError,
    },

    #[error("Failed to load document: {0}")]
    Document(#[source] ExtractionError),

    #[error("No output for task '{0}'")]
    MissingOutput(TaskKind),

    #[error("Task catalog is empty")]
    EmptyCatalog,

    #[error("Concurrency limiter closed")]
    LimiterClosed,
}
