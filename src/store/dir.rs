//! Directory-backed object store.
//!
//! One file per object under a root directory, named by the key's hex
//! form. Payloads are framed as `[crc32: u32 LE][data]` so bit rot is
//! detected on fetch. A JSON sidecar (`objects.json`) records payload
//! lengths and lets `len` answer without touching the object file.

use super::{ObjectId, ObjectStore};
use crate::error::StoreError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "objects.json";
const OBJECT_EXT: &str = "obj";
const FRAME_HEADER: usize = 4;

/// Disk-backed store rooted at a directory.
pub struct DirStore {
    root: PathBuf,
    index: Mutex<HashMap<String, u64>>,
}

impl DirStore {
    /// Creates the root directory (if needed) and an empty index.
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        fs::create_dir_all(&root)?;
        let store = DirStore {
            root: root.as_ref().to_path_buf(),
            index: Mutex::new(HashMap::new()),
        };
        store.write_index(&store.index.lock())?;
        Ok(store)
    }

    /// Opens an existing store, rebuilding the index from the object
    /// files when the sidecar is missing.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        let index_path = root.join(INDEX_FILE);

        let index = if index_path.is_file() {
            let data = fs::read(&index_path)?;
            serde_json::from_slice(&data)?
        } else {
            tracing::warn!(root = %root.display(), "object index missing, rescanning");
            let mut rebuilt = HashMap::new();
            for entry in fs::read_dir(&root)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(OBJECT_EXT) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    let framed = fs::metadata(&path)?.len();
                    rebuilt.insert(
                        stem.to_string(),
                        framed.saturating_sub(FRAME_HEADER as u64),
                    );
                }
            }
            rebuilt
        };

        Ok(DirStore {
            root,
            index: Mutex::new(index),
        })
    }

    /// Filesystem path backing this store.
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join(format!("{}.{}", id.to_hex(), OBJECT_EXT))
    }

    fn write_index(&self, index: &HashMap<String, u64>) -> Result<(), StoreError> {
        let data = serde_json::to_vec(index)?;
        fs::write(self.root.join(INDEX_FILE), data)?;
        Ok(())
    }

    fn read_framed(&self, id: &ObjectId) -> Result<Vec<u8>, StoreError> {
        let framed = match fs::read(self.object_path(id)) {
            Ok(framed) => framed,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(StoreError::Io(e)),
        };
        if framed.len() < FRAME_HEADER {
            return Err(StoreError::Corrupt(format!(
                "object {} shorter than its frame header",
                id
            )));
        }
        let stored_crc = u32::from_le_bytes([framed[0], framed[1], framed[2], framed[3]]);
        let payload = &framed[FRAME_HEADER..];
        if crc32fast::hash(payload) != stored_crc {
            return Err(StoreError::Corrupt(format!(
                "checksum mismatch for object {}",
                id
            )));
        }
        Ok(payload.to_vec())
    }

    fn write_framed(&self, id: &ObjectId, payload: &[u8]) -> Result<(), StoreError> {
        let mut framed = Vec::with_capacity(FRAME_HEADER + payload.len());
        framed.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        framed.extend_from_slice(payload);
        fs::write(self.object_path(id), framed)?;

        let mut index = self.index.lock();
        index.insert(id.to_hex(), payload.len() as u64);
        self.write_index(&index)
    }
}

impl ObjectStore for DirStore {
    fn fetch(&self, id: &ObjectId) -> Result<Vec<u8>, StoreError> {
        self.read_framed(id)
    }

    fn store(&self, id: &ObjectId, data: &[u8]) -> Result<(), StoreError> {
        self.write_framed(id, data)
    }

    fn append(&self, id: &ObjectId, data: &[u8]) -> Result<(), StoreError> {
        let mut payload = match self.read_framed(id) {
            Ok(existing) => existing,
            Err(StoreError::NotFound) => Vec::new(),
            Err(e) => return Err(e),
        };
        payload.extend_from_slice(data);
        self.write_framed(id, &payload)
    }

    fn delete(&self, id: &ObjectId) -> Result<(), StoreError> {
        match fs::remove_file(self.object_path(id)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(StoreError::Io(e)),
        }
        let mut index = self.index.lock();
        index.remove(&id.to_hex());
        self.write_index(&index)
    }

    fn len(&self, id: &ObjectId) -> Result<u64, StoreError> {
        if let Some(len) = self.index.lock().get(&id.to_hex()) {
            return Ok(*len);
        }
        match fs::metadata(self.object_path(id)) {
            Ok(meta) => Ok(meta.len().saturating_sub(FRAME_HEADER as u64)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_store_fetch_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::create(dir.path()).unwrap();
        let id = ObjectId::generate();

        store.store(&id, b"payload").unwrap();
        assert_eq!(store.fetch(&id).unwrap(), b"payload");
        assert_eq!(store.len(&id).unwrap(), 7);
    }

    #[test]
    fn test_append_creates_then_grows() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::create(dir.path()).unwrap();
        let id = ObjectId::generate();

        store.append(&id, b"ab").unwrap();
        store.append(&id, b"cd").unwrap();
        assert_eq!(store.fetch(&id).unwrap(), b"abcd");
    }

    #[test]
    fn test_delete_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::create(dir.path()).unwrap();
        assert!(matches!(
            store.delete(&ObjectId::generate()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_reopen_preserves_objects() {
        let dir = tempfile::tempdir().unwrap();
        let id = ObjectId::generate();

        {
            let store = DirStore::create(dir.path()).unwrap();
            store.store(&id, b"persistent").unwrap();
        }

        let reopened = DirStore::open(dir.path()).unwrap();
        assert_eq!(reopened.fetch(&id).unwrap(), b"persistent");
        assert_eq!(reopened.len(&id).unwrap(), 10);
    }

    #[test]
    fn test_reopen_without_index_rescans() {
        let dir = tempfile::tempdir().unwrap();
        let id = ObjectId::generate();

        {
            let store = DirStore::create(dir.path()).unwrap();
            store.store(&id, b"abc").unwrap();
        }
        fs::remove_file(dir.path().join(INDEX_FILE)).unwrap();

        let reopened = DirStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(&id).unwrap(), 3);
        assert_eq!(reopened.fetch(&id).unwrap(), b"abc");
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::create(dir.path()).unwrap();
        let id = ObjectId::generate();
        store.store(&id, b"intact").unwrap();

        // Flip one payload byte behind the store's back.
        let path = store.object_path(&id);
        let mut framed = fs::read(&path).unwrap();
        let last = framed.len() - 1;
        framed[last] ^= 0xff;
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&framed).unwrap();

        assert!(matches!(store.fetch(&id), Err(StoreError::Corrupt(_))));
    }
}
