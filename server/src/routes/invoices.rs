//! Invoice upload endpoint.

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::info;

use invoicy::worker::{
    check_upload_extension, new_job_dir, prepare_submission, stage_file, JobMetadata,
    SubmissionKind,
};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Default)]
struct UploadForm {
    id: Option<String>,
    secret_key: Option<String>,
    file: Option<(String, Bytes)>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "id" | "secret_key" => {
                    let value = field.text().await.map_err(|e| {
                        ApiError::BadRequest(format!("Failed to read field '{}': {}", name, e))
                    })?;
                    let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                    if name == "id" {
                        form.id = value;
                    } else {
                        form.secret_key = value;
                    }
                }
                "file" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await.map_err(|e| {
                        ApiError::BadRequest(format!("Failed to read file: {}", e))
                    })?;
                    if !file_name.is_empty() {
                        form.file = Some((file_name, data));
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.is_none() {
            missing.push("id");
        }
        if self.secret_key.is_none() {
            missing.push("secret_key");
        }
        if self.file.is_none() {
            missing.push("file");
        }
        missing
    }
}

/// POST /process-invoice
///
/// Single images and PDFs are extracted inline and answered with the record
/// (unless synchronous processing is disabled); ZIP archives are expanded,
/// queued and answered with their manifest.
pub async fn process_invoice(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::read(multipart).await?;

    let missing = form.missing_fields();
    let (Some(id), Some(secret_key), Some((file_name, data))) = (form.id, form.secret_key, form.file)
    else {
        return Err(ApiError::MissingFields(missing.join(", ")));
    };

    if !state.is_authorized(&secret_key) {
        return Err(ApiError::Unauthorized);
    }

    check_upload_extension(&file_name)?;

    info!(job_id = %id, file_name = %file_name, bytes = data.len(), "Invoice upload received");

    let temp_dir = new_job_dir(state.work_dir.as_deref())?;
    let staged = stage_file(temp_dir.path(), &file_name, &data).await?;
    let submission = prepare_submission(&id, staged, temp_dir, JobMetadata::default()).await?;

    if submission.kind == SubmissionKind::Document && state.sync_single_documents {
        let result = state
            .queue
            .process_now(submission.job)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("no result for document".to_string()))?;

        let record = result.map_err(|e| ApiError::Internal(e.to_string()))?;
        return Ok((StatusCode::OK, Json(record)).into_response());
    }

    let manifest = state.queue.accept(submission).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "La factura está siendo procesada.",
            "manifest": manifest,
        })),
    )
        .into_response())
}
