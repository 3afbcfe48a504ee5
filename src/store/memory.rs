//! In-memory object store backend.

use super::{ObjectId, ObjectStore};
use crate::error::StoreError;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Heap-backed store, the default for tests and ephemeral mounts.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<ObjectId, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    /// True when the store holds an object under `id`.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.lock().contains_key(id)
    }
}

impl ObjectStore for MemoryStore {
    fn fetch(&self, id: &ObjectId) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn store(&self, id: &ObjectId, data: &[u8]) -> Result<(), StoreError> {
        self.objects.lock().insert(*id, data.to_vec());
        Ok(())
    }

    fn append(&self, id: &ObjectId, data: &[u8]) -> Result<(), StoreError> {
        self.objects
            .lock()
            .entry(*id)
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn delete(&self, id: &ObjectId) -> Result<(), StoreError> {
        self.objects
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn len(&self, id: &ObjectId) -> Result<u64, StoreError> {
        self.objects
            .lock()
            .get(id)
            .map(|data| data.len() as u64)
            .ok_or(StoreError::NotFound)
    }
}
