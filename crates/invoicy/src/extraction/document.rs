use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

use super::error::ExtractionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl DocumentKind {
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        if media_type == "application/pdf" {
            Some(Self::Pdf)
        } else if media_type.starts_with("image/") {
            Some(Self::Image)
        } else {
            None
        }
    }
}

/// A work item's file, read once and base64-encoded for every task request.
#[derive(Debug, Clone)]
pub struct Document {
    pub kind: DocumentKind,
    pub media_type: String,
    pub data: String,
}

impl Document {
    pub async fn load(path: &Path, media_type: &str) -> Result<Self, ExtractionError> {
        let kind = DocumentKind::from_media_type(media_type)
            .ok_or_else(|| ExtractionError::UnsupportedMedia(media_type.to_string()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ExtractionError::Document {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(Self {
            kind,
            media_type: media_type.to_string(),
            data: STANDARD.encode(bytes),
        })
    }

    pub fn from_bytes(bytes: &[u8], media_type: &str) -> Result<Self, ExtractionError> {
        let kind = DocumentKind::from_media_type(media_type)
            .ok_or_else(|| ExtractionError::UnsupportedMedia(media_type.to_string()))?;

        Ok(Self {
            kind,
            media_type: media_type.to_string(),
            data: STANDARD.encode(bytes),
        })
    }
}
