//! Runtime wiring
//!
//! Builds the storage backends from configuration so binary crates and the
//! HTTP server construct them the same way.

use std::sync::Arc;

use configs::{ActiveBackend, AppConfig};
use tracing::info;

use crate::storage::{LocalStorage, RemoteStorage, StorageBackend, StorageKind, StorageSet};

/// Ensure the upload root exists, then build every configured backend.
pub async fn build_storage(cfg: &AppConfig) -> anyhow::Result<StorageSet> {
    common::env::ensure_upload_root(&cfg.uploads.root).await?;
    let local = Arc::new(LocalStorage::new(cfg.uploads.root.clone(), &cfg.uploads.url_prefix));

    let remote: Option<Arc<dyn StorageBackend>> = match &cfg.remote {
        Some(remote_cfg) => Some(Arc::new(RemoteStorage::new(remote_cfg.clone())?)),
        None => None,
    };
    let active = match cfg.active_backend() {
        ActiveBackend::Local => StorageKind::Local,
        ActiveBackend::Remote => StorageKind::Remote,
    };
    info!(active = %active, remote_configured = remote.is_some(), "storage_backends_ready");
    Ok(StorageSet::new(local, remote, active)?)
}
