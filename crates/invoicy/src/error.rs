use std::path::PathBuf;
use thiserror::Error;

pub use crate::extraction::ExtractionError;
pub use crate::secrets::SecretError;
pub use crate::toolchain::ToolchainError;

#[derive(Error, Debug)]
pub enum InvoicyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failures in job intake and bookkeeping that are not tied to a single
/// extraction: staging, archive expansion, downloads, cleanup.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Unsupported file extension '{extension}' for '{file_name}'")]
    UnsupportedExtension {
        file_name: String,
        extension: String,
    },

    #[error("Unsupported content type {media_type} for '{file_name}'")]
    UnsupportedContent {
        file_name: String,
        media_type: String,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed archive '{path}': {message}")]
    MalformedArchive { path: PathBuf, message: String },

    #[error("Failed to download attachment from {url}: {message}")]
    Download { url: String, message: String },

    #[error("Failed to clean up '{path}': {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Blocking task failed: {0}")]
    Blocking(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Job failed: {0}")]
    JobFailed(String),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink '{0}' is not configured")]
    NotConfigured(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sink rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook responded with status {status}")]
    Rejected { status: u16 },
}

pub type Result<T> = std::result::Result<T, InvoicyError>;
