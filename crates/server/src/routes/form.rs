//! Multipart body reading shared by the upload handlers.

use std::collections::HashMap;

use axum::extract::Multipart;
use service::UploadFile;

use crate::errors::JsonApiError;

/// File parts and text parts of one multipart body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub files: HashMap<String, Vec<UploadFile>>,
    pub fields: HashMap<String, String>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, JsonApiError> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| JsonApiError::bad_request(format!("multipart error: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| JsonApiError::bad_request(format!("read error: {e}")))?;
                    form.files.entry(name).or_default().push(UploadFile {
                        filename,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| JsonApiError::bad_request(format!("read error: {e}")))?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// Files sent under any of `names`, minus the empty parts browsers send
    /// for an untouched file input.
    pub fn take_files(&mut self, names: &[&str]) -> Vec<UploadFile> {
        names
            .iter()
            .filter_map(|n| self.files.remove(*n))
            .flatten()
            .filter(|f| !f.filename.trim().is_empty())
            .collect()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<&str, JsonApiError> {
        self.text(name).ok_or_else(|| JsonApiError::bad_request(format!("{name} is required")))
    }

    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Result<T, JsonApiError> {
        self.required(name)?
            .parse::<T>()
            .map_err(|_| JsonApiError::bad_request(format!("{name} is invalid")))
    }
}
