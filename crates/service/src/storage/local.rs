use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{unique_name, StorageBackend, StorageError, StorageKind, StoredRef};

/// Files under one upload root, addressed as `{url_prefix}/{file name}`.
pub struct LocalStorage {
    root: PathBuf,
    url_prefix: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        let trimmed = url_prefix.trim().trim_end_matches('/');
        let url_prefix = if trimmed.starts_with('/') { trimmed.to_string() } else { format!("/{trimmed}") };
        Self { root: root.into(), url_prefix }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.url_prefix, file_name)
    }

    /// Filesystem path behind a local URL.
    ///
    /// Only the last path segment is used, so stored URLs such as
    /// `static/uploads/x.png`, `/static/uploads/x.png` or a hostile
    /// `../../x.png` all land directly under the root.
    pub fn path_for(&self, url: &str) -> Result<PathBuf, StorageError> {
        let name = file_name_of(url).ok_or_else(|| StorageError::InvalidRef(url.to_string()))?;
        Ok(self.root.join(name))
    }

    pub async fn exists(&self, stored: &StoredRef) -> Result<bool, StorageError> {
        let path = self.path_for(&stored.url)?;
        Ok(fs::try_exists(path).await?)
    }

    pub async fn read(&self, stored: &StoredRef) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(&stored.url)?;
        Ok(fs::read(path).await?)
    }
}

fn file_name_of(url: &str) -> Option<&str> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        n => Some(n),
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    async fn store(&self, content: &[u8], suggested_name: &str) -> Result<StoredRef, StorageError> {
        let name = unique_name(suggested_name);
        let full_path = self.root.join(&name);
        debug!(file = %name, size = content.len(), "local_storage: write");

        fs::create_dir_all(&self.root).await.map_err(|e| {
            warn!(root = %self.root.display(), error = %e, "local_storage: create_dir_all failed");
            e
        })?;

        // Write to a temp name and rename so a half-written file never carries the final name
        let temp_path = full_path.with_extension("part");
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(content).await?;
            file.sync_all().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;
        if let Err(e) = written {
            warn!(temp_path = %temp_path.display(), error = %e, "local_storage: write failed");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "local_storage: rename failed");
            e
        })?;

        Ok(StoredRef::local(self.url_for(&name)))
    }

    async fn delete(&self, stored: &StoredRef) -> Result<bool, StorageError> {
        let path = self.path_for(&stored.url)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "local_storage: already gone");
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, stored: &StoredRef) -> String {
        match file_name_of(&stored.url) {
            Some(name) => self.url_for(name),
            None => stored.url.clone(),
        }
    }
}
