use models::{service_history, service_history_image};
use sea_orm::DatabaseConnection;
use tracing::{debug, info, instrument, warn};

use super::{AssetRef, AttachResult};
use crate::errors::ServiceError;
use crate::storage::{StorageSet, StoredRef};
use crate::upload::{FileError, FileErrorKind, UploadFile, UploadPolicy};

/// Attach, replace and delete image attachments.
///
/// Storage calls and row commits are separate units, ordered so that a
/// failure leaves at worst an orphaned stored object, never a row pointing
/// at nothing.
pub struct ImageAssetManager {
    db: DatabaseConnection,
    storage: StorageSet,
    policy: UploadPolicy,
}

impl ImageAssetManager {
    pub fn new(db: DatabaseConnection, storage: StorageSet, policy: UploadPolicy) -> Self {
        Self { db, storage, policy }
    }

    pub fn storage(&self) -> &StorageSet {
        &self.storage
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    fn asset_ref(&self, m: &service_history_image::Model) -> AssetRef {
        let stored = StoredRef::from(m);
        AssetRef { id: m.id, image_url: self.storage.resolve(&stored), public_id: stored.public_id }
    }

    async fn ensure_record(&self, record_id: i32) -> Result<service_history::Model, ServiceError> {
        service_history::find(&self.db, record_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(&format!("service history {record_id}")))
    }

    /// Image row that exists and belongs to `record_id`.
    async fn owned_image(&self, record_id: i32, image_id: i32) -> Result<service_history_image::Model, ServiceError> {
        self.ensure_record(record_id).await?;
        let image = service_history_image::find(&self.db, image_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(&format!("image {image_id}")))?;
        if image.service_history_id != record_id {
            return Err(ServiceError::Ownership { image_id, record_id });
        }
        Ok(image)
    }

    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn attach(&self, record_id: i32, files: Vec<UploadFile>) -> Result<AttachResult, ServiceError> {
        self.ensure_record(record_id).await?;
        Ok(self.attach_files(record_id, files).await)
    }

    /// Attach to a record the caller has just created or already checked.
    pub(crate) async fn attach_files(&self, record_id: i32, files: Vec<UploadFile>) -> AttachResult {
        let mut result = AttachResult::default();
        for file in &files {
            match self.attach_one(record_id, file).await {
                Ok(asset) => result.created.push(asset),
                Err(e) => {
                    warn!(record_id, filename = %e.filename, kind = ?e.kind, error = %e.message, "image_attach_failed");
                    result.failed.push(e);
                }
            }
        }
        info!(record_id, created = result.created.len(), failed = result.failed.len(), "images_attached");
        result
    }

    async fn attach_one(&self, record_id: i32, file: &UploadFile) -> Result<AssetRef, FileError> {
        debug!(
            record_id,
            filename = %file.filename,
            content_type = file.content_type.as_deref().unwrap_or("unknown"),
            size = file.bytes.len(),
            "image_attach"
        );
        self.policy
            .validate(file)
            .map_err(|e| FileError::new(&file.filename, FileErrorKind::Validation, message_of(e)))?;

        let stored = self
            .storage
            .active()
            .store(&file.bytes, &file.filename)
            .await
            .map_err(|e| FileError::new(&file.filename, FileErrorKind::Storage, e.to_string()))?;

        match service_history_image::create(&self.db, record_id, &stored.url, stored.public_id.as_deref()).await {
            Ok(row) => Ok(self.asset_ref(&row)),
            Err(e) => {
                self.storage.release(&stored, "attach_rollback").await;
                Err(FileError::new(&file.filename, FileErrorKind::Persistence, e.to_string()))
            }
        }
    }

    /// Swap the stored object behind an image, keeping its id.
    #[instrument(skip(self, file), fields(filename = %file.filename))]
    pub async fn replace(&self, record_id: i32, image_id: i32, file: UploadFile) -> Result<AssetRef, ServiceError> {
        self.policy.validate(&file)?;
        let old = self.owned_image(record_id, image_id).await?;

        let stored = self.storage.active().store(&file.bytes, &file.filename).await?;
        let updated =
            match service_history_image::set_location(&self.db, old.id, &stored.url, stored.public_id.as_deref()).await {
                Ok(row) => row,
                Err(e) => {
                    self.storage.release(&stored, "replace_rollback").await;
                    return Err(e.into());
                }
            };

        // The old object goes only after the row points at the new one
        let old_ref = StoredRef::from(&old);
        if !self.storage.release(&old_ref, "replaced").await {
            warn!(image_id, old_url = %old_ref.url, "old_image_left_in_storage");
        }
        info!(image_id, kind = %StoredRef::from(&updated).kind(), "image_replaced");
        Ok(self.asset_ref(&updated))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, record_id: i32, image_id: i32) -> Result<(), ServiceError> {
        let image = self.owned_image(record_id, image_id).await?;
        self.remove_row_and_object(&image).await?;
        info!(image_id, "image_deleted");
        Ok(())
    }

    /// Best-effort object delete, then the row regardless.
    ///
    /// Returns whether the backend confirmed the object delete. A row that is
    /// already gone is `NotFound`.
    pub(crate) async fn remove_row_and_object(&self, image: &service_history_image::Model) -> Result<bool, ServiceError> {
        let stored = StoredRef::from(image);
        let released = self.storage.release(&stored, "image_deleted").await;
        if !service_history_image::delete(&self.db, image.id).await? {
            return Err(ServiceError::not_found(&format!("image {}", image.id)));
        }
        Ok(released)
    }

    pub async fn list(&self, record_id: i32) -> Result<Vec<AssetRef>, ServiceError> {
        self.ensure_record(record_id).await?;
        let rows = service_history_image::list_by_history(&self.db, record_id).await?;
        Ok(rows.iter().map(|m| self.asset_ref(m)).collect())
    }
}

fn message_of(e: ServiceError) -> String {
    match e {
        ServiceError::Validation(m) => m,
        other => other.to_string(),
    }
}
