//! Turns an uploaded or downloaded file into a [`Job`] plus a manifest of
//! what will and will not be processed.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::JobError;
use crate::sanitize::{redact_path, redact_url};

use super::archive::{expand_archive, ArchiveContents, RejectedMember};
use super::job::{Job, JobMetadata, WorkItem};

pub const SUPPORTED_UPLOAD_EXTENSIONS: &[&str] = &["zip", "pdf", "png", "jpg", "jpeg", "webp", "gif"];

/// Rejects uploads whose extension is not on the allowlist.
pub fn check_upload_extension(file_name: &str) -> Result<(), JobError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if SUPPORTED_UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(JobError::UnsupportedExtension {
            file_name: file_name.to_string(),
            extension,
        })
    }
}

/// Last path component of a client-supplied name, never empty.
pub fn safe_file_name(name: &str) -> String {
    match name.rsplit(['/', '\\']).next().map(str::trim) {
        Some(base) if !base.is_empty() && base != "." && base != ".." => base.to_string(),
        _ => "upload".to_string(),
    }
}

/// Creates the per-job temp dir, under `work_dir` when given.
pub fn new_job_dir(work_dir: Option<&Path>) -> Result<TempDir, JobError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("invoicy-");
    let result = match work_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| JobError::CreateDirectory {
                path: dir.to_path_buf(),
                source: e,
            })?;
            builder.tempdir_in(dir)
        }
        None => builder.tempdir(),
    };
    result.map_err(|e| JobError::CreateDirectory {
        path: work_dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
        source: e,
    })
}

pub async fn stage_file(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, JobError> {
    let path = dir.join(safe_file_name(file_name));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| JobError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
    debug!(file = %redact_path(&path), bytes = bytes.len(), "Staged file");
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    Document { media_type: String },
    Archive,
    Unsupported { media_type: String },
}

/// Classifies a staged file by its magic bytes.
pub fn sniff(path: &Path) -> Result<ContentKind, JobError> {
    let detected = infer::get_from_path(path).map_err(|e| JobError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let Some(kind) = detected else {
        return Ok(ContentKind::Unsupported {
            media_type: "unknown".to_string(),
        });
    };

    let media_type = kind.mime_type();
    Ok(match media_type {
        "application/zip" => ContentKind::Archive,
        "application/pdf" => ContentKind::Document {
            media_type: media_type.to_string(),
        },
        m if m.starts_with("image/") => ContentKind::Document {
            media_type: m.to_string(),
        },
        other => ContentKind::Unsupported {
            media_type: other.to_string(),
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub file_name: String,
    pub reason: String,
}

/// What a submission turned into. `to_process_count + skipped_count ==
/// total_count` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub job_id: String,
    pub total_count: usize,
    pub to_process_count: usize,
    pub skipped_count: usize,
    pub accepted: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

impl Manifest {
    fn new(job_id: &str, items: &[WorkItem], rejected: &[RejectedMember]) -> Self {
        let skipped: Vec<SkippedFile> = rejected
            .iter()
            .map(|r| SkippedFile {
                file_name: r.file_name.clone(),
                reason: r.reason.clone(),
            })
            .collect();
        Self {
            job_id: job_id.to_string(),
            total_count: items.len() + skipped.len(),
            to_process_count: items.len(),
            skipped_count: skipped.len(),
            accepted: items.iter().map(|i| i.file_name.clone()).collect(),
            skipped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Document,
    Archive,
}

#[derive(Debug)]
pub struct Submission {
    pub kind: SubmissionKind,
    pub job: Job,
    pub manifest: Manifest,
}

/// Classifies `staged` (which lives inside `temp_dir`) and builds the job.
///
/// A single document keeps `job_id` as its process id; archive members get
/// `"{job_id}/{file_name}"`. The archive itself is deleted once expanded.
pub async fn prepare_submission(
    job_id: &str,
    staged: PathBuf,
    temp_dir: TempDir,
    metadata: JobMetadata,
) -> Result<Submission, JobError> {
    let sniff_path = staged.clone();
    let kind = tokio::task::spawn_blocking(move || sniff(&sniff_path))
        .await
        .map_err(|e| JobError::Blocking(e.to_string()))??;

    match kind {
        ContentKind::Document { media_type } => {
            let items = vec![WorkItem::new(job_id, staged, media_type)];
            let manifest = Manifest::new(job_id, &items, &[]);
            Ok(Submission {
                kind: SubmissionKind::Document,
                job: Job::new(job_id, items)
                    .with_metadata(metadata)
                    .with_temp_dir(temp_dir),
                manifest,
            })
        }
        ContentKind::Archive => {
            let dest = temp_dir.path().join("members");
            let zip_path = staged.clone();
            let batch_id = job_id.to_string();
            let contents: ArchiveContents = tokio::task::spawn_blocking(move || {
                expand_archive(&zip_path, &dest, &batch_id)
            })
            .await
            .map_err(|e| JobError::Blocking(e.to_string()))??;

            tokio::fs::remove_file(&staged)
                .await
                .map_err(|e| JobError::Cleanup {
                    path: staged.clone(),
                    source: e,
                })?;

            let manifest = Manifest::new(job_id, &contents.items, &contents.rejected);
            info!(
                job_id,
                total = manifest.total_count,
                to_process = manifest.to_process_count,
                skipped = manifest.skipped_count,
                "Expanded archive"
            );

            Ok(Submission {
                kind: SubmissionKind::Archive,
                job: Job::new(job_id, contents.items)
                    .with_metadata(metadata)
                    .with_rejected(contents.rejected)
                    .with_temp_dir(temp_dir),
                manifest,
            })
        }
        ContentKind::Unsupported { media_type } => Err(JobError::UnsupportedContent {
            file_name: redact_path(&staged),
            media_type,
        }),
    }
}

/// File name for a downloaded attachment, from the last URL path segment.
pub fn attachment_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_query
        .split_once("://")
        .map(|(_, rest)| rest.split_once('/').map(|(_, p)| p).unwrap_or(""))
        .unwrap_or(without_query);

    match path.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => safe_file_name(segment),
        _ => "attachment".to_string(),
    }
}

pub async fn download_attachment(
    client: &reqwest::Client,
    url: &str,
    dir: &Path,
) -> Result<PathBuf, JobError> {
    let download_error = |message: String| JobError::Download {
        url: redact_url(url),
        message,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_error(e.to_string()))?;

    if !response.status().is_success() {
        return Err(download_error(format!("status {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_error(e.to_string()))?;

    stage_file(dir, &attachment_name(url), &bytes).await
}
