//! Storage backends for image attachments.
//!
//! Every stored object is addressed by a [`StoredRef`]. Whether a reference
//! belongs to the local filesystem or the remote object store is decided by
//! the presence of a public id (see [`StorageKind::of`]), never by which
//! endpoint produced it.
//!
//! Components:
//! - `local`: files under one upload root, served under a URL prefix.
//! - `remote`: Cloudinary-compatible object store (signed upload/destroy).
//! - `memory`: in-process backend with failure switches, used by tests.

pub mod local;
pub mod memory;
pub mod remote;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub use local::LocalStorage;
pub use memory::InMemoryStorage;
pub use remote::RemoteStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(String),
    #[error("remote api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid storage reference: {0}")]
    InvalidRef(String),
    #[error("{0} storage backend is not configured")]
    NotConfigured(StorageKind),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Http(e.to_string())
    }
}

/// Which physical store owns an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Remote,
}

impl StorageKind {
    /// A public id is only ever issued by the remote store.
    pub fn of(public_id: Option<&str>) -> Self {
        match public_id {
            Some(_) => StorageKind::Remote,
            None => StorageKind::Local,
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Local => f.write_str("local"),
            StorageKind::Remote => f.write_str("remote"),
        }
    }
}

/// Reference to a stored object as persisted on an image row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRef {
    pub url: String,
    pub public_id: Option<String>,
}

impl StoredRef {
    pub fn local(url: impl Into<String>) -> Self {
        Self { url: url.into(), public_id: None }
    }

    pub fn remote(url: impl Into<String>, public_id: impl Into<String>) -> Self {
        Self { url: url.into(), public_id: Some(public_id.into()) }
    }

    pub fn kind(&self) -> StorageKind {
        StorageKind::of(self.public_id.as_deref())
    }
}

impl From<&models::service_history_image::Model> for StoredRef {
    fn from(m: &models::service_history_image::Model) -> Self {
        Self { url: m.image_url.clone(), public_id: m.public_id.clone() }
    }
}

/// "Put a file, get a reference back; delete by reference."
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> StorageKind;

    /// Persist `content` under a backend-generated unique name.
    /// `suggested_name` only contributes its extension.
    async fn store(&self, content: &[u8], suggested_name: &str) -> Result<StoredRef, StorageError>;

    /// Remove the backing object. An object that is already gone counts as removed.
    async fn delete(&self, stored: &StoredRef) -> Result<bool, StorageError>;

    /// Public URL for a reference. Pure; performs no I/O.
    fn resolve(&self, stored: &StoredRef) -> String;
}

/// Lower-cased extension of a client-supplied filename, if any.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

/// Collision-free object name: a random token plus the original extension.
pub fn unique_name(suggested_name: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    match extension_of(suggested_name) {
        Some(ext) => format!("{token}.{ext}"),
        None => token,
    }
}

/// The process-wide set of backends, built once at startup.
#[derive(Clone)]
pub struct StorageSet {
    local: Arc<LocalStorage>,
    remote: Option<Arc<dyn StorageBackend>>,
    active: StorageKind,
}

impl StorageSet {
    pub fn new(
        local: Arc<LocalStorage>,
        remote: Option<Arc<dyn StorageBackend>>,
        active: StorageKind,
    ) -> Result<Self, StorageError> {
        if active == StorageKind::Remote && remote.is_none() {
            return Err(StorageError::NotConfigured(StorageKind::Remote));
        }
        Ok(Self { local, remote, active })
    }

    pub fn local(&self) -> &Arc<LocalStorage> {
        &self.local
    }

    pub fn remote(&self) -> Option<&Arc<dyn StorageBackend>> {
        self.remote.as_ref()
    }

    pub fn active_kind(&self) -> StorageKind {
        self.active
    }

    /// Backend receiving new objects.
    pub fn active(&self) -> &dyn StorageBackend {
        match self.active {
            StorageKind::Remote => match &self.remote {
                Some(r) => r.as_ref(),
                None => self.local.as_ref(),
            },
            StorageKind::Local => self.local.as_ref(),
        }
    }

    pub fn for_kind(&self, kind: StorageKind) -> Result<&dyn StorageBackend, StorageError> {
        match kind {
            StorageKind::Local => Ok(self.local.as_ref()),
            StorageKind::Remote => self
                .remote
                .as_deref()
                .ok_or(StorageError::NotConfigured(StorageKind::Remote)),
        }
    }

    /// Backend owning an existing reference.
    pub fn for_ref(&self, stored: &StoredRef) -> Result<&dyn StorageBackend, StorageError> {
        self.for_kind(stored.kind())
    }

    pub fn resolve(&self, stored: &StoredRef) -> String {
        match self.for_ref(stored) {
            Ok(backend) => backend.resolve(stored),
            Err(_) => stored.url.clone(),
        }
    }

    /// Best-effort delete: failures are logged and reported as `false`, never raised.
    pub async fn release(&self, stored: &StoredRef, reason: &str) -> bool {
        let backend = match self.for_ref(stored) {
            Ok(b) => b,
            Err(e) => {
                warn!(url = %stored.url, public_id = ?stored.public_id, error = %e, reason, "storage_release_skipped");
                return false;
            }
        };
        match backend.delete(stored).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(url = %stored.url, public_id = ?stored.public_id, kind = %backend.kind(), reason, "storage_release_not_confirmed");
                false
            }
            Err(e) => {
                warn!(url = %stored.url, public_id = ?stored.public_id, kind = %backend.kind(), error = %e, reason, "storage_release_failed");
                false
            }
        }
    }
}
