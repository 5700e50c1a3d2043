//! Image attachments of service history records.

pub mod manager;

use serde::Serialize;

use crate::upload::{FileError, FileErrorKind};

pub use manager::ImageAssetManager;

/// An attached image as handed back to callers, URL already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRef {
    pub id: i32,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
}

/// Per-file outcome of a batch attach. One bad file never fails the batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttachResult {
    pub created: Vec<AssetRef>,
    pub failed: Vec<FileError>,
}

impl AttachResult {
    /// Nothing was attached and at least one file failed for a non-validation reason.
    pub fn all_failed_in_backend(&self) -> bool {
        self.created.is_empty()
            && !self.failed.is_empty()
            && self.failed.iter().any(|f| f.kind != FileErrorKind::Validation)
    }

    /// Nothing was attached and every file was rejected by validation.
    pub fn all_rejected(&self) -> bool {
        self.created.is_empty()
            && !self.failed.is_empty()
            && self.failed.iter().all(|f| f.kind == FileErrorKind::Validation)
    }
}
