use std::sync::Arc;

use models::service_history::{self, NewServiceHistory, ServiceHistoryChanges};
use models::service_history_image;
use sea_orm::DatabaseConnection;
use tracing::{info, instrument, warn};

use super::{CreatedRecord, RecordDeletion, RecordWithImages, UpdatedRecord};
use crate::errors::ServiceError;
use crate::images::ImageAssetManager;
use crate::upload::UploadFile;

/// Create, edit and delete service history records, cascading to their images.
pub struct ServiceRecordLifecycle {
    db: DatabaseConnection,
    images: Arc<ImageAssetManager>,
}

impl ServiceRecordLifecycle {
    pub fn new(db: DatabaseConnection, images: Arc<ImageAssetManager>) -> Self {
        Self { db, images }
    }

    async fn find_record(&self, record_id: i32) -> Result<service_history::Model, ServiceError> {
        service_history::find(&self.db, record_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(&format!("service history {record_id}")))
    }

    /// The record is committed first; it stays even if every image fails.
    #[instrument(skip(self, input, files), fields(customer_id = input.customer_id, files = files.len()))]
    pub async fn create(&self, input: NewServiceHistory, files: Vec<UploadFile>) -> Result<CreatedRecord, ServiceError> {
        let record = service_history::create(&self.db, &input).await?;
        info!(record_id = record.id, "service_history_created");
        let attach = self.images.attach_files(record.id, files).await;
        Ok(CreatedRecord { record, attach })
    }

    pub async fn get(&self, record_id: i32) -> Result<RecordWithImages, ServiceError> {
        let record = self.find_record(record_id).await?;
        let images = self.images.list(record_id).await?;
        Ok(RecordWithImages { record, images })
    }

    /// Apply field changes, then drop the listed images.
    ///
    /// Ids owned by another record reject the whole call before anything is
    /// written. Ids that do not exist are skipped.
    #[instrument(skip(self, changes, delete_image_ids), fields(delete = delete_image_ids.len()))]
    pub async fn update(
        &self,
        record_id: i32,
        changes: &ServiceHistoryChanges,
        delete_image_ids: &[i32],
    ) -> Result<UpdatedRecord, ServiceError> {
        self.find_record(record_id).await?;

        let mut doomed = Vec::with_capacity(delete_image_ids.len());
        for &image_id in delete_image_ids {
            match service_history_image::find(&self.db, image_id).await? {
                Some(img) if img.service_history_id != record_id => {
                    return Err(ServiceError::Ownership { image_id, record_id });
                }
                Some(img) => {
                    if !doomed.iter().any(|d: &service_history_image::Model| d.id == img.id) {
                        doomed.push(img);
                    }
                }
                None => warn!(record_id, image_id, "delete_image_unknown_skipped"),
            }
        }

        let record = service_history::update(&self.db, record_id, changes).await?;

        let mut removed = Vec::with_capacity(doomed.len());
        let mut backend_failures = 0;
        for img in &doomed {
            match self.images.remove_row_and_object(img).await {
                Ok(released) => {
                    if !released {
                        backend_failures += 1;
                    }
                    removed.push(img.id);
                }
                Err(ServiceError::NotFound(_)) => warn!(image_id = img.id, "image_already_removed"),
                Err(e) => return Err(e),
            }
        }
        info!(record_id, removed = removed.len(), backend_failures, "service_history_updated");
        Ok(UpdatedRecord { record, removed, backend_failures })
    }

    /// Images first, each object best-effort then its row; the record row last.
    #[instrument(skip(self))]
    pub async fn delete(&self, record_id: i32) -> Result<RecordDeletion, ServiceError> {
        self.find_record(record_id).await?;

        let images = service_history_image::list_by_history(&self.db, record_id).await?;
        let mut images_removed = 0;
        let mut backend_failures = 0;
        for img in &images {
            match self.images.remove_row_and_object(img).await {
                Ok(released) => {
                    images_removed += 1;
                    if !released {
                        backend_failures += 1;
                    }
                }
                Err(ServiceError::NotFound(_)) => warn!(image_id = img.id, "image_already_removed"),
                Err(e) => return Err(e),
            }
        }

        if !service_history::delete(&self.db, record_id).await? {
            return Err(ServiceError::not_found(&format!("service history {record_id}")));
        }
        info!(record_id, images_removed, backend_failures, "service_history_deleted");
        Ok(RecordDeletion { record_id, images_removed, backend_failures })
    }
}
