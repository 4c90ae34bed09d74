use std::path::PathBuf;
use thiserror::Error;

use super::tasks::TaskKind;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Output of '{task}' failed validation: {message}")]
    Validation { task: TaskKind, message: String },

    #[error("Rate limited after {attempts} attempts (last status {last_status})")]
    RateLimited { attempts: u32, last_status: u16 },

    #[error("{0}")]
    Fatal(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("'{task}' failed after {attempts} attempts: {source}")]
    Exhausted {
        task: TaskKind,
        attempts: u32,
        #[source]
        source: Box<ExtractionError>,
    },

    #[error("Failed to read document '{path}': {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Invalid schema for '{task}': {message}")]
    InvalidSchema { task: TaskKind, message: String },
}

impl ExtractionError {
    /// Transient failures that a later attempt may not hit again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
