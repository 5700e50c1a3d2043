//! Cloudinary-compatible remote object store.
//!
//! Uploads and deletes are signed requests: the signed parameters are sorted
//! by name, joined as `k=v&k=v`, suffixed with the API secret and hashed with
//! SHA-256 (`signature_algorithm=sha256`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use configs::RemoteStorageConfig;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{extension_of, StorageBackend, StorageError, StorageKind, StoredRef};

pub struct RemoteStorage {
    client: reqwest::Client,
    cfg: RemoteStorageConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl RemoteStorage {
    pub fn new(cfg: RemoteStorageConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self { client, cfg })
    }

    pub fn folder(&self) -> &str {
        &self.cfg.folder
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            self.cfg.api_base_url.trim_end_matches('/'),
            self.cfg.cloud_name,
            action
        )
    }

    fn sign(&self, params: &[(&str, String)]) -> String {
        sign_params(params, &self.cfg.api_secret)
    }

    async fn api_error(resp: reqwest::Response) -> StorageError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        StorageError::Api { status, message }
    }
}

/// Hex SHA-256 over the sorted `k=v` pairs followed by the secret.
pub fn sign_params(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recover a public id from a delivery URL such as
/// `https://res.cloudinary.com/demo/image/upload/v1712/salon_uploads/abc.jpg`
/// (→ `salon_uploads/abc`). Returns `None` for URLs without an `upload` segment.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let segments: Vec<&str> = path.split('/').collect();
    let upload = segments.iter().position(|s| *s == "upload")?;
    let mut rest: Vec<&str> = segments[upload + 1..].iter().copied().filter(|s| !s.is_empty()).collect();
    if rest.first().is_some_and(|s| is_version_segment(s)) {
        rest.remove(0);
    }
    let last = rest.pop()?;
    let stem = match last.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => last,
    };
    rest.push(stem);
    Some(rest.join("/"))
}

fn is_version_segment(s: &str) -> bool {
    s.len() > 1 && s.starts_with('v') && s[1..].chars().all(|c| c.is_ascii_digit())
}

#[async_trait]
impl StorageBackend for RemoteStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Remote
    }

    #[instrument(skip(self, content), fields(size = content.len(), folder = %self.cfg.folder))]
    async fn store(&self, content: &[u8], suggested_name: &str) -> Result<StoredRef, StorageError> {
        let token = Uuid::new_v4().simple().to_string();
        let timestamp = Utc::now().timestamp().to_string();
        let signed = [
            ("folder", self.cfg.folder.clone()),
            ("public_id", token.clone()),
            ("timestamp", timestamp.clone()),
        ];
        let signature = self.sign(&signed);

        let file_name = match extension_of(suggested_name) {
            Some(ext) => format!("{token}.{ext}"),
            None => token.clone(),
        };
        let part = Part::bytes(content.to_vec()).file_name(file_name);
        let form = Form::new()
            .part("file", part)
            .text("api_key", self.cfg.api_key.clone())
            .text("folder", self.cfg.folder.clone())
            .text("public_id", token)
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let resp = self.client.post(self.endpoint("upload")).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }
        let body: UploadResponse = resp.json().await?;
        info!(public_id = %body.public_id, "remote_storage_uploaded");
        Ok(StoredRef::remote(body.secure_url, body.public_id))
    }

    #[instrument(skip(self, stored), fields(public_id = ?stored.public_id))]
    async fn delete(&self, stored: &StoredRef) -> Result<bool, StorageError> {
        let public_id = stored
            .public_id
            .clone()
            .ok_or_else(|| StorageError::InvalidRef(format!("{} has no public id", stored.url)))?;
        let timestamp = Utc::now().timestamp().to_string();
        let signed = [("public_id", public_id.clone()), ("timestamp", timestamp.clone())];
        let signature = self.sign(&signed);

        let params = [
            ("public_id", public_id),
            ("timestamp", timestamp),
            ("api_key", self.cfg.api_key.clone()),
            ("signature", signature),
            ("signature_algorithm", "sha256".to_string()),
        ];
        let resp = self.client.post(self.endpoint("destroy")).form(&params).send().await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }
        let body: DestroyResponse = resp.json().await?;
        debug!(result = %body.result, "remote_storage_destroy");
        match body.result.as_str() {
            "ok" | "not found" => Ok(true),
            other => Err(StorageError::Api { status: 200, message: format!("destroy returned {other}") }),
        }
    }

    /// The URL issued at upload time; rebuilt from the public id only when none was kept.
    fn resolve(&self, stored: &StoredRef) -> String {
        if !stored.url.trim().is_empty() {
            return stored.url.clone();
        }
        match &stored.public_id {
            Some(pid) => format!(
                "{}/{}/image/upload/{}",
                self.cfg.delivery_base_url.trim_end_matches('/'),
                self.cfg.cloud_name,
                pid
            ),
            None => stored.url.clone(),
        }
    }
}
