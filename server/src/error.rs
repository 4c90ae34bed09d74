use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::io;
use thiserror::Error;

use invoicy::error::{ConfigError, JobError, SecretError, WorkerError};
use invoicy::InvoicyError;

/// Errors raised while starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Invoicy(#[from] InvoicyError),

    #[error("Shared secret is not configured: {0}")]
    Secret(#[from] SecretError),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] io::Error),
}

/// Request failures, rendered as `{"success": false, "error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("The following fields are required: {0}")]
    MissingFields(String),

    #[error("Invalid secret key")]
    Unauthorized,

    #[error("Tipo de archivo no permitido: .{extension}. Solo se aceptan: {allowed}")]
    UnsupportedExtension { extension: String, allowed: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("The queue is not accepting jobs")]
    Unavailable,

    #[error("Error interno del servidor: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFields(_)
            | ApiError::UnsupportedExtension { .. }
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::UnsupportedExtension { extension, .. } => ApiError::UnsupportedExtension {
                extension,
                allowed: invoicy::worker::intake::SUPPORTED_UPLOAD_EXTENSIONS.join(", "),
            },
            JobError::UnsupportedContent { .. } => {
                ApiError::BadRequest("Tipo de archivo no permitido.".to_string())
            }
            JobError::MalformedArchive { .. } => ApiError::BadRequest(err.to_string()),
            JobError::Download { .. } => ApiError::BadGateway(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<WorkerError> for ApiError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::ChannelClosed => ApiError::Unavailable,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "{}", self);
        }
        (
            status,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}
