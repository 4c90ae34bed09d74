//! ZIP expansion into per-member work items. Blocking; callers run it on
//! `spawn_blocking`.

use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::JobError;

use super::job::{dotted_extension, WorkItem};

pub const SUPPORTED_MEMBER_EXTENSIONS: &[&str] = &[".pdf", ".png", ".jpg", ".jpeg", ".webp", ".gif"];

/// An archive member that did not become a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedMember {
    pub process_id: String,
    pub file_name: String,
    pub file_extension: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ArchiveContents {
    pub items: Vec<WorkItem>,
    pub rejected: Vec<RejectedMember>,
}

impl ArchiveContents {
    pub fn member_count(&self) -> usize {
        self.items.len() + self.rejected.len()
    }
}

pub fn is_supported_member(extension: &str) -> bool {
    SUPPORTED_MEMBER_EXTENSIONS.contains(&extension)
}

/// Expands `zip_path` into `dest`. Directory entries are skipped and not
/// counted; entries escaping `dest` and unsupported types are rejected.
pub fn expand_archive(
    zip_path: &Path,
    dest: &Path,
    batch_id: &str,
) -> Result<ArchiveContents, JobError> {
    let file = File::open(zip_path).map_err(|e| JobError::ReadFile {
        path: zip_path.to_path_buf(),
        source: e,
    })?;
    let malformed = |e: zip::result::ZipError| JobError::MalformedArchive {
        path: zip_path.to_path_buf(),
        message: e.to_string(),
    };
    let mut archive = ZipArchive::new(file).map_err(malformed)?;

    let mut contents = ArchiveContents::default();
    let mut seen = HashSet::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(malformed)?;
        if entry.is_dir() {
            continue;
        }

        let raw_name = entry.name().to_string();
        let Some(relative) = entry.enclosed_name() else {
            warn!(member = %raw_name, "Rejecting archive member with unsafe path");
            let file_name = raw_name.rsplit(['/', '\\']).next().unwrap_or(&raw_name).to_string();
            contents.rejected.push(RejectedMember {
                process_id: format!("{}/{}", batch_id, file_name),
                file_extension: dotted_extension(&file_name),
                file_name,
                reason: "unsafe path in archive".to_string(),
            });
            continue;
        };

        let file_name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| raw_name.clone());
        let file_extension = dotted_extension(&file_name);

        // two members may share a file name in different folders
        let mut process_id = format!("{}/{}", batch_id, file_name);
        if !seen.insert(process_id.clone()) {
            process_id = format!("{}/{}", batch_id, relative.to_string_lossy());
            seen.insert(process_id.clone());
        }

        if !is_supported_member(&file_extension) {
            debug!(member = %file_name, "Skipping unsupported archive member");
            contents.rejected.push(RejectedMember {
                process_id,
                file_name,
                file_extension: file_extension.clone(),
                reason: format!("unsupported file type '{}'", file_extension),
            });
            continue;
        }

        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| JobError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let mut out = File::create(&target).map_err(|e| JobError::WriteFile {
            path: target.clone(),
            source: e,
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| JobError::WriteFile {
            path: target.clone(),
            source: e,
        })?;

        let media_type = mime_guess::from_path(&target)
            .first_raw()
            .unwrap_or("application/octet-stream");
        contents
            .items
            .push(WorkItem::new(process_id, target, media_type));
    }

    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(dir: &Path, members: &[(&str, &[u8])], directories: &[&str]) -> std::path::PathBuf {
        let path = dir.join("batch.zip");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for name in directories {
            writer
                .add_directory(*name, SimpleFileOptions::default())
                .unwrap();
        }
        for (name, data) in members {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_two_supported_one_unsupported() {
        let dir = TempDir::new().unwrap();
        let zip_path = build_zip(
            dir.path(),
            &[("a.png", b"png"), ("b.pdf", b"%PDF"), ("notes.txt", b"hi")],
            &["empty/"],
        );
        let dest = dir.path().join("out");

        let contents = expand_archive(&zip_path, &dest, "batch").unwrap();

        let ids: Vec<&str> = contents.items.iter().map(|i| i.process_id.as_str()).collect();
        assert_eq!(ids, vec!["batch/a.png", "batch/b.pdf"]);
        assert_eq!(contents.items[0].media_type, "image/png");
        assert_eq!(contents.items[1].media_type, "application/pdf");
        assert!(contents.items[0].path().exists());

        assert_eq!(contents.rejected.len(), 1);
        assert_eq!(contents.rejected[0].process_id, "batch/notes.txt");
        assert_eq!(contents.rejected[0].file_extension, ".txt");
        assert!(!dest.join("notes.txt").exists());
        assert_eq!(contents.member_count(), 3);
    }

    #[test]
    fn test_nested_members_keep_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let zip_path = build_zip(
            dir.path(),
            &[("march/f.pdf", b"1"), ("april/f.pdf", b"2")],
            &[],
        );

        let contents = expand_archive(&zip_path, &dir.path().join("out"), "b").unwrap();
        assert_eq!(contents.items[0].process_id, "b/f.pdf");
        assert_eq!(contents.items[1].process_id, "b/april/f.pdf");
    }

    #[test]
    fn test_uppercase_extension_is_supported() {
        let dir = TempDir::new().unwrap();
        let zip_path = build_zip(dir.path(), &[("SCAN.JPG", b"jpg")], &[]);

        let contents = expand_archive(&zip_path, &dir.path().join("out"), "b").unwrap();
        assert_eq!(contents.items.len(), 1);
        assert_eq!(contents.items[0].media_type, "image/jpeg");
    }

    #[test]
    fn test_malformed_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"PK\x03\x04 not really").unwrap();

        let result = expand_archive(&path, &dir.path().join("out"), "b");
        assert!(matches!(result, Err(JobError::MalformedArchive { .. })));
    }
}
