use std::sync::Arc;

use configs::AppConfig;
use service::{ImageAssetManager, ServiceRecordLifecycle};

#[derive(Clone)]
pub struct ServerState {
    pub images: Arc<ImageAssetManager>,
    pub records: Arc<ServiceRecordLifecycle>,
    pub config: Arc<AppConfig>,
}

impl ServerState {
    pub fn new(images: Arc<ImageAssetManager>, records: Arc<ServiceRecordLifecycle>, config: AppConfig) -> Self {
        Self { images, records, config: Arc::new(config) }
    }
}
