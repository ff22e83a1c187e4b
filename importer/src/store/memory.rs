use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;

use super::BlobStore;

/// Stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub body: Bytes,
    pub content_type: String,
}

/// In-memory blob store, for dry runs and tests.
///
/// Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<String, Object>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Object> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> crate::Result<()> {
        let object = Object {
            body,
            content_type: content_type.to_owned(),
        };

        self.objects
            .write()
            .map_err(|_| crate::Error::storage("memory store lock poisoned"))?
            .insert(key.to_owned(), object);

        Ok(())
    }
}
