use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::{md5_hex, ObjectStore};
use crate::error::StoreError;

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// In-memory bucket that records how many uploads and deletes it served.
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    puts: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Insert an object without counting it as an upload.
    pub fn insert(&self, key: &str, body: impl Into<Bytes>, content_type: &str) {
        self.write().insert(
            key.to_string(),
            StoredObject {
                body: body.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), md5_hex(&v.body)))
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.read().contains_key(key))
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.insert(key, body, content_type);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.write().remove(key);
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.name
    }
}
