//! Inbound-mail hook: an attachment URL to download and queue, with an
//! optional address to reply to once extracted.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use invoicy::sanitize::redact_url;
use invoicy::worker::{download_attachment, new_job_dir, prepare_submission, Job, JobMetadata};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InboundRequest {
    pub secret_key: String,
    pub attachment_url: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// POST /inbound
pub async fn inbound(
    State(state): State<AppState>,
    payload: Result<Json<InboundRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = payload?;
    if !state.is_authorized(&request.secret_key) {
        return Err(ApiError::Unauthorized);
    }

    let job_id = request.id.unwrap_or_else(Job::generate_id);
    info!(job_id = %job_id, url = %redact_url(&request.attachment_url), "Inbound attachment received");

    let temp_dir = new_job_dir(state.work_dir.as_deref())?;
    let staged = download_attachment(&state.http, &request.attachment_url, temp_dir.path()).await?;
    let metadata = JobMetadata::inbound(request.reply_to, request.subject);
    let submission = prepare_submission(&job_id, staged, temp_dir, metadata).await?;
    let manifest = state.queue.accept(submission).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "job_id": job_id,
            "manifest": manifest,
        })),
    ))
}
