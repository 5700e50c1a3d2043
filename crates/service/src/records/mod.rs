//! Service history records and the cascade of their images.

pub mod lifecycle;

use serde::Serialize;

use crate::images::{AssetRef, AttachResult};

pub use lifecycle::ServiceRecordLifecycle;

#[derive(Debug, Clone, Serialize)]
pub struct CreatedRecord {
    pub record: models::service_history::Model,
    pub attach: AttachResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordWithImages {
    pub record: models::service_history::Model,
    pub images: Vec<AssetRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedRecord {
    pub record: models::service_history::Model,
    /// Ids of the images removed along with the update.
    pub removed: Vec<i32>,
    pub backend_failures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordDeletion {
    pub record_id: i32,
    pub images_removed: usize,
    /// Objects whose backend delete failed; their rows were removed anyway.
    pub backend_failures: usize,
}
