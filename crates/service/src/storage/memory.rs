use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{unique_name, StorageBackend, StorageError, StorageKind, StoredRef};

/// Process-local backend keeping objects in a map.
///
/// Stands in for either store in tests; `set_fail_store` / `set_fail_delete`
/// make the next calls fail the way an unreachable backend would.
pub struct InMemoryStorage {
    kind: StorageKind,
    base_url: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_store: AtomicBool,
    fail_delete: AtomicBool,
}

impl InMemoryStorage {
    /// Objects are keyed by a `folder/token` public id, like the remote store.
    pub fn new_remote(base_url: &str) -> Self {
        Self::with_kind(StorageKind::Remote, base_url)
    }

    /// Objects are keyed by their URL and carry no public id.
    pub fn new_local(url_prefix: &str) -> Self {
        Self::with_kind(StorageKind::Local, url_prefix)
    }

    fn with_kind(kind: StorageKind, base_url: &str) -> Self {
        Self {
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            fail_store: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key_of(&self, stored: &StoredRef) -> Option<String> {
        match self.kind {
            StorageKind::Remote => stored.public_id.clone(),
            StorageKind::Local => Some(stored.url.clone()),
        }
    }

    pub fn set_fail_store(&self, fail: bool) {
        self.fail_store.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, stored: &StoredRef) -> bool {
        match self.key_of(stored) {
            Some(key) => self.objects().contains_key(&key),
            None => false,
        }
    }

    pub fn get(&self, stored: &StoredRef) -> Option<Vec<u8>> {
        let key = self.key_of(stored)?;
        self.objects().get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn kind(&self) -> StorageKind {
        self.kind
    }

    async fn store(&self, content: &[u8], suggested_name: &str) -> Result<StoredRef, StorageError> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store disabled".into()));
        }
        let name = unique_name(suggested_name);
        let stored = match self.kind {
            StorageKind::Remote => {
                let public_id = match name.rsplit_once('.') {
                    Some((stem, _)) => format!("mem/{stem}"),
                    None => format!("mem/{name}"),
                };
                StoredRef::remote(format!("{}/{}", self.base_url, name), public_id)
            }
            StorageKind::Local => StoredRef::local(format!("{}/{}", self.base_url, name)),
        };
        if let Some(key) = self.key_of(&stored) {
            self.objects().insert(key, content.to_vec());
        }
        Ok(stored)
    }

    async fn delete(&self, stored: &StoredRef) -> Result<bool, StorageError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("delete disabled".into()));
        }
        let key = self
            .key_of(stored)
            .ok_or_else(|| StorageError::InvalidRef(format!("{} has no public id", stored.url)))?;
        self.objects().remove(&key);
        Ok(true)
    }

    fn resolve(&self, stored: &StoredRef) -> String {
        stored.url.clone()
    }
}
