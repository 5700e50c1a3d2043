#![cfg(test)]
use std::sync::Arc;

use configs::DatabaseConfig;
use migration::MigratorTrait;
use models::db::connect_with_config;
use models::service_history::NewServiceHistory;
use sea_orm::DatabaseConnection;
use tempfile::TempDir;

use crate::images::ImageAssetManager;
use crate::records::ServiceRecordLifecycle;
use crate::storage::{InMemoryStorage, LocalStorage, StorageBackend, StorageKind, StorageSet};
use crate::upload::{UploadFile, UploadPolicy};

/// Everything a service test needs; drop order keeps the temp dir alive last.
pub struct Harness {
    pub db: DatabaseConnection,
    pub local: Arc<LocalStorage>,
    pub remote: Arc<InMemoryStorage>,
    pub storage: StorageSet,
    pub images: Arc<ImageAssetManager>,
    pub records: ServiceRecordLifecycle,
    pub dir: TempDir,
}

/// Fresh migrated SQLite database in its own temp directory.
pub async fn get_db(dir: &TempDir) -> Result<DatabaseConnection, anyhow::Error> {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("service.db").display());
    let mut cfg = DatabaseConfig::for_url(&url);
    cfg.min_connections = 1;
    cfg.max_connections = 4;
    let db = connect_with_config(&cfg).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn harness(active: StorageKind) -> Result<Harness, anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let db = get_db(&dir).await?;
    let local = Arc::new(LocalStorage::new(dir.path().join("uploads"), "/static/uploads"));
    let remote = Arc::new(InMemoryStorage::new_remote("https://cdn.test/salon_uploads"));
    let storage = StorageSet::new(local.clone(), Some(remote.clone() as Arc<dyn StorageBackend>), active)?;
    let images = Arc::new(ImageAssetManager::new(
        db.clone(),
        storage.clone(),
        UploadPolicy::new(["png", "jpg", "jpeg", "gif"], 1024),
    ));
    let records = ServiceRecordLifecycle::new(db.clone(), images.clone());
    Ok(Harness { db, local, remote, storage, images, records, dir })
}

pub fn new_history() -> NewServiceHistory {
    NewServiceHistory {
        customer_id: 1,
        service_id: 2,
        employee_id: 3,
        service_date: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        price: 150000.0,
        payment_method: "card".into(),
        notes: None,
    }
}

pub fn png(name: &str) -> UploadFile {
    UploadFile::new(name, format!("png:{name}").into_bytes())
}
