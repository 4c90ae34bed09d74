use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::archive::RejectedMember;

/// A staged file owned by exactly one work item. Deleted on [`ScratchFile::close`]
/// or, failing that, on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    closed: bool,
}

impl ScratchFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file. A file that is already gone is not an error.
    pub fn close(mut self) -> io::Result<()> {
        self.closed = true;
        remove_if_present(&self.path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.closed {
            let _ = remove_if_present(&self.path);
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// One document to run the toolchain on.
#[derive(Debug)]
pub struct WorkItem {
    pub process_id: String,
    pub file: ScratchFile,
    pub media_type: String,
    pub file_name: String,
    /// Lowercase, with the leading dot (`.pdf`). Empty when the name has none.
    pub file_extension: String,
}

impl WorkItem {
    pub fn new(process_id: impl Into<String>, path: PathBuf, media_type: impl Into<String>) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_extension = dotted_extension(&file_name);
        Self {
            process_id: process_id.into(),
            file: ScratchFile::new(path),
            media_type: media_type.into(),
            file_name,
            file_extension,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn info(&self) -> ItemInfo {
        ItemInfo {
            process_id: self.process_id.clone(),
            file_name: self.file_name.clone(),
            file_extension: self.file_extension.clone(),
            media_type: self.media_type.clone(),
        }
    }

    /// Deletes the item's file.
    pub fn close(self) -> io::Result<()> {
        self.file.close()
    }
}

/// Owned description of a work item, for notifications and the active map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemInfo {
    pub process_id: String,
    pub file_name: String,
    pub file_extension: String,
    pub media_type: String,
}

/// `.ext` in lowercase, or empty.
pub fn dotted_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    #[default]
    Upload,
    Inbound,
}

/// Where a job came from and who to answer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobMetadata {
    pub reply_to: Option<String>,
    pub subject: Option<String>,
    pub source: JobSource,
}

impl JobMetadata {
    pub fn inbound(reply_to: Option<String>, subject: Option<String>) -> Self {
        Self {
            reply_to: reply_to.filter(|r| !r.trim().is_empty()),
            subject,
            source: JobSource::Inbound,
        }
    }

    /// Subject line for the email answering this job.
    pub fn reply_subject(&self) -> String {
        match self.subject.as_deref().map(str::trim) {
            Some(subject) if !subject.is_empty() => format!("Re: {}", subject),
            _ => "Factura procesada".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub items: Vec<WorkItem>,
    pub metadata: JobMetadata,
    /// Archive members that did not become items. Reported when the job is
    /// first processed.
    pub rejected: Vec<RejectedMember>,
    /// Holds every item's file; removed once all items are done.
    pub temp_dir: Option<TempDir>,
}

impl Job {
    pub fn new(id: impl Into<String>, items: Vec<WorkItem>) -> Self {
        Self {
            id: id.into(),
            items,
            metadata: JobMetadata::default(),
            rejected: Vec::new(),
            temp_dir: None,
        }
    }

    /// Fresh id for jobs whose caller did not supply one.
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn with_metadata(mut self, metadata: JobMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_rejected(mut self, rejected: Vec<RejectedMember>) -> Self {
        self.rejected = rejected;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: TempDir) -> Self {
        self.temp_dir = Some(temp_dir);
        self
    }
}
