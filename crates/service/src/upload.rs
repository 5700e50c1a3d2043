//! Uploaded files and the checks they pass before reaching a backend.

use std::collections::BTreeSet;

use configs::UploadConfig;
use serde::Serialize;

use crate::errors::ServiceError;
use crate::storage::extension_of;

/// One file taken from a multipart body.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { filename: filename.into(), content_type: None, bytes: bytes.into() }
    }
}

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed: BTreeSet<String>,
    max_bytes: usize,
}

impl UploadPolicy {
    pub fn new<I, S>(allowed: I, max_bytes: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = allowed.into_iter().map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase()).collect();
        Self { allowed, max_bytes }
    }

    pub fn from_config(cfg: &UploadConfig) -> Self {
        Self::new(cfg.allowed_extensions.iter(), cfg.max_upload_bytes)
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Returns the lower-cased extension of an acceptable file.
    pub fn validate(&self, file: &UploadFile) -> Result<String, ServiceError> {
        let name = file.filename.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("no file selected".into()));
        }
        let ext = extension_of(name)
            .filter(|e| self.allowed.contains(e))
            .ok_or_else(|| ServiceError::Validation(format!("{name}: file type not allowed")))?;
        if file.bytes.is_empty() {
            return Err(ServiceError::Validation(format!("{name}: file is empty")));
        }
        if file.bytes.len() > self.max_bytes {
            return Err(ServiceError::Validation(format!(
                "{name}: file exceeds {} bytes",
                self.max_bytes
            )));
        }
        Ok(ext)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileErrorKind {
    Validation,
    Storage,
    Persistence,
}

/// Why a single file of a batch was not attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub filename: String,
    pub message: String,
    pub kind: FileErrorKind,
}

impl FileError {
    pub fn new(filename: &str, kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self { filename: filename.to_string(), message: message.into(), kind }
    }
}
