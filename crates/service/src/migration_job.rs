//! One-shot move of every locally stored image to the remote store.
//!
//! Expected to run while no live traffic touches images. Each image is its
//! own unit: upload, row update in a transaction, then local file removal.
//! Rows already pointing at the remote store are never selected again, so a
//! second run processes nothing.

use std::sync::Arc;

use models::service_history_image;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::errors::ServiceError;
use crate::storage::remote::public_id_from_url;
use crate::storage::{LocalStorage, StorageBackend, StorageError, StorageKind, StorageSet, StoredRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStage {
    Read,
    Upload,
    Persist,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    pub image_id: i32,
    pub stage: MigrationStage,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingFile,
    /// URL was issued by the remote store but the row lost its public id.
    RemoteUrlWithoutPublicId,
    InvalidUrl,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub image_id: i32,
    pub image_url: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    pub failed: Vec<ItemError>,
    pub skipped_items: Vec<SkippedItem>,
    /// Migrated images whose local file could not be removed.
    pub local_cleanup_failures: Vec<i32>,
}

impl MigrationReport {
    pub fn processed(&self) -> usize {
        self.migrated + self.skipped + self.failed.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedItem {
    pub image_id: i32,
    pub service_history_id: i32,
    pub image_url: String,
    pub local_file_present: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationPlan {
    pub candidates: Vec<PlannedItem>,
}

enum Outcome {
    Migrated { local_removed: bool },
    Skipped(SkipReason),
    Failed(MigrationStage, String),
}

pub struct MigrationJob {
    db: DatabaseConnection,
    local: Arc<LocalStorage>,
    remote: Arc<dyn StorageBackend>,
}

impl MigrationJob {
    pub fn new(db: DatabaseConnection, local: Arc<LocalStorage>, remote: Arc<dyn StorageBackend>) -> Self {
        Self { db, local, remote }
    }

    pub fn from_storage(db: DatabaseConnection, storage: &StorageSet) -> Result<Self, ServiceError> {
        let remote = storage
            .remote()
            .cloned()
            .ok_or(StorageError::NotConfigured(StorageKind::Remote))?;
        Ok(Self::new(db, storage.local().clone(), remote))
    }

    pub async fn candidates(&self) -> Result<Vec<service_history_image::Model>, ServiceError> {
        Ok(service_history_image::list_local(&self.db).await?)
    }

    /// What a run would touch; changes nothing.
    pub async fn dry_run(&self) -> Result<MigrationPlan, ServiceError> {
        let mut plan = MigrationPlan::default();
        for asset in self.candidates().await? {
            let local_file_present = self.local.exists(&StoredRef::from(&asset)).await.unwrap_or(false);
            plan.candidates.push(PlannedItem {
                image_id: asset.id,
                service_history_id: asset.service_history_id,
                image_url: asset.image_url,
                local_file_present,
            });
        }
        Ok(plan)
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<MigrationReport, ServiceError> {
        let candidates = self.candidates().await?;
        info!(count = candidates.len(), "image_migration_started");

        let mut report = MigrationReport::default();
        for asset in &candidates {
            match self.migrate_one(asset).await {
                Outcome::Migrated { local_removed } => {
                    report.migrated += 1;
                    if !local_removed {
                        report.local_cleanup_failures.push(asset.id);
                    }
                }
                Outcome::Skipped(reason) => {
                    warn!(image_id = asset.id, url = %asset.image_url, ?reason, "image_migration_skipped");
                    report.skipped += 1;
                    report.skipped_items.push(SkippedItem {
                        image_id: asset.id,
                        image_url: asset.image_url.clone(),
                        reason,
                    });
                }
                Outcome::Failed(stage, message) => {
                    error!(image_id = asset.id, ?stage, error = %message, "image_migration_failed");
                    report.failed.push(ItemError { image_id: asset.id, stage, message });
                }
            }
        }

        info!(
            migrated = report.migrated,
            skipped = report.skipped,
            failed = report.failed.len(),
            leaked_local = report.local_cleanup_failures.len(),
            "image_migration_finished"
        );
        Ok(report)
    }

    async fn migrate_one(&self, asset: &service_history_image::Model) -> Outcome {
        let local_ref = StoredRef::from(asset);

        let present = match self.local.exists(&local_ref).await {
            Ok(p) => p,
            Err(StorageError::InvalidRef(_)) => return Outcome::Skipped(SkipReason::InvalidUrl),
            Err(e) => return Outcome::Failed(MigrationStage::Read, e.to_string()),
        };
        if !present {
            let remote_looking = asset.image_url.starts_with("http") && public_id_from_url(&asset.image_url).is_some();
            return Outcome::Skipped(if remote_looking {
                SkipReason::RemoteUrlWithoutPublicId
            } else {
                SkipReason::MissingFile
            });
        }

        let content = match self.local.read(&local_ref).await {
            Ok(c) => c,
            Err(e) => return Outcome::Failed(MigrationStage::Read, e.to_string()),
        };
        let uploaded = match self.remote.store(&content, &asset.image_url).await {
            Ok(r) => r,
            Err(e) => return Outcome::Failed(MigrationStage::Upload, e.to_string()),
        };

        if let Err(e) = self.commit_location(asset.id, &uploaded).await {
            if let Err(del) = self.remote.delete(&uploaded).await {
                warn!(image_id = asset.id, public_id = ?uploaded.public_id, error = %del, "uploaded_object_orphaned");
            }
            return Outcome::Failed(MigrationStage::Persist, e.to_string());
        }

        let local_removed = match self.local.delete(&local_ref).await {
            Ok(_) => true,
            Err(e) => {
                warn!(image_id = asset.id, url = %asset.image_url, error = %e, "local_file_left_after_migration");
                false
            }
        };
        info!(image_id = asset.id, public_id = ?uploaded.public_id, "image_migrated");
        Outcome::Migrated { local_removed }
    }

    async fn commit_location(&self, image_id: i32, uploaded: &StoredRef) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        match service_history_image::set_location(&txn, image_id, &uploaded.url, uploaded.public_id.as_deref()).await {
            Ok(_) => {
                txn.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = txn.rollback().await {
                    warn!(image_id, error = %rb, "migration_rollback_failed");
                }
                Err(e.into())
            }
        }
    }
}
