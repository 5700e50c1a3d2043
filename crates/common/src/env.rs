//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::{info, warn};

/// Ensure the local upload root exists and is writable.
///
/// The directory is created when missing. A marker file is written and removed
/// so a read-only mount is reported at startup instead of on the first upload.
pub async fn ensure_upload_root(root: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", root.display()))?;

    let marker = root.join(".write-check");
    if let Err(e) = tokio::fs::write(&marker, b"ok").await {
        warn!(root = %root.display(), error = %e, "upload root is not writable; local uploads will fail");
        return Ok(());
    }
    let _ = tokio::fs::remove_file(&marker).await;
    info!(root = %root.display(), "upload root ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_root() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().join("static").join("uploads");
        ensure_upload_root(&root).await?;
        assert!(root.is_dir());
        assert!(!root.join(".write-check").exists());
        Ok(())
    }
}
