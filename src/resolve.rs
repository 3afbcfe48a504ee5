//! Path resolution over the node/entry encoding.
//!
//! Paths are resolved by walking slash-separated segments from the root
//! node through successive directory-entry scans. A companion walk stops
//! one segment early and returns the parent node together with the key it
//! is stored under, which is what create/delete/attribute paths need.

use crate::dirent::{self, DirEntry};
use crate::error::{KeyFsError, Result, StoreError};
use crate::node::NodeRecord;
use crate::store::{ObjectId, ObjectStore, ROOT_KEY};

/// Splits a slash-separated path into its segments. "/" yields none.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Splits a path into its parent segments and leaf name.
///
/// "/" has no leaf and is rejected; operations that need a parent cannot
/// target the root itself.
pub fn split_parent(path: &str) -> Result<(Vec<&str>, &str)> {
    let mut segments = split_path(path);
    let leaf = segments
        .pop()
        .ok_or_else(|| KeyFsError::InvalidName(path.to_string()))?;
    Ok((segments, leaf))
}

/// Fetches and decodes the node record stored under `id`.
///
/// A missing record during a walk means the path does not exist.
pub(crate) fn fetch_node<S: ObjectStore>(store: &S, id: &ObjectId) -> Result<NodeRecord> {
    match store.fetch(id) {
        Ok(bytes) => NodeRecord::from_bytes(&bytes),
        Err(StoreError::NotFound) => Err(KeyFsError::NotFound),
        Err(e) => Err(e.into()),
    }
}

/// Fetches and decodes a directory's entry records, verifying the object
/// length against the node's declared size.
pub(crate) fn fetch_entries<S: ObjectStore>(
    store: &S,
    node: &NodeRecord,
) -> Result<Vec<DirEntry>> {
    if node.content_ref.is_nil() {
        if node.size != 0 {
            return Err(KeyFsError::SizeMismatch {
                expected: node.size,
                found: 0,
            });
        }
        return Ok(Vec::new());
    }

    let bytes = match store.fetch(&node.content_ref) {
        Ok(bytes) => bytes,
        Err(StoreError::NotFound) => return Err(KeyFsError::NotFound),
        Err(e) => return Err(e.into()),
    };
    if bytes.len() as u64 != node.size {
        tracing::warn!(
            declared = node.size,
            fetched = bytes.len(),
            "directory object length disagrees with node size"
        );
        return Err(KeyFsError::SizeMismatch {
            expected: node.size,
            found: bytes.len() as u64,
        });
    }
    dirent::decode_entries(&bytes)
}

/// Walks `path` from the root node to its target.
///
/// The walker stops at a non-directory when only the final segment
/// remains; a deeper trailing segment under a non-directory is an error.
pub fn resolve<S: ObjectStore>(store: &S, root: &NodeRecord, path: &str) -> Result<NodeRecord> {
    let segments = split_path(path);
    let mut current = *root;
    let mut iter = segments.into_iter().peekable();

    while let Some(segment) = iter.next() {
        if !current.is_directory() {
            if iter.peek().is_none() {
                break;
            }
            return Err(KeyFsError::NotFound);
        }
        if current.entry_count() == 0 {
            return Err(KeyFsError::NotFound);
        }
        let entries = fetch_entries(store, &current)?;
        let index = dirent::find_entry(&entries, segment).ok_or(KeyFsError::NotFound)?;
        current = fetch_node(store, &entries[index].node)?;
    }

    Ok(current)
}

/// Resolves the parent directory of `path`, returning the parent record
/// and the key it is stored under.
///
/// A path with a single segment parents directly at the root, which is
/// the one node reachable without a directory scan.
pub fn resolve_parent<S: ObjectStore>(
    store: &S,
    root: &NodeRecord,
    path: &str,
) -> Result<(NodeRecord, ObjectId)> {
    let (parents, _) = split_parent(path)?;
    let mut current = *root;
    let mut current_id = ROOT_KEY;

    for segment in parents {
        if !current.is_directory() || current.entry_count() == 0 {
            return Err(KeyFsError::NotFound);
        }
        let entries = fetch_entries(store, &current)?;
        let index = dirent::find_entry(&entries, segment).ok_or(KeyFsError::NotFound)?;
        current_id = entries[index].node;
        current = fetch_node(store, &current_id)?;
    }

    if !current.is_directory() {
        return Err(KeyFsError::NotADirectory(path.to_string()));
    }
    Ok((current, current_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirent::{encode_entries, DIR_ENTRY_SIZE};
    use crate::node::Credentials;
    use crate::store::MemoryStore;

    // Hand-assembles `parent -> name` without the engine, so the walker
    // is exercised against the raw encoding.
    fn link(
        store: &MemoryStore,
        parent: &mut NodeRecord,
        parent_id: &ObjectId,
        name: &str,
        child: NodeRecord,
    ) -> ObjectId {
        let child_id = ObjectId::generate();
        store.store(&child_id, &child.to_bytes()).unwrap();

        if parent.content_ref.is_nil() {
            parent.content_ref = ObjectId::generate();
        }
        let entry = DirEntry::new(name, child_id).unwrap();
        store.append(&parent.content_ref, &entry.to_bytes()).unwrap();
        parent.size += DIR_ENTRY_SIZE as u64;
        store.store(parent_id, &parent.to_bytes()).unwrap();
        child_id
    }

    fn root_dir() -> NodeRecord {
        NodeRecord::new_directory(0o755, Credentials::default())
    }

    #[test]
    fn test_resolve_root() {
        let store = MemoryStore::new();
        let root = root_dir();
        let node = resolve(&store, &root, "/").unwrap();
        assert_eq!(node, root);
    }

    #[test]
    fn test_resolve_missing_in_empty_root() {
        let store = MemoryStore::new();
        let root = root_dir();
        assert!(matches!(
            resolve(&store, &root, "/missing"),
            Err(KeyFsError::NotFound)
        ));
    }

    #[test]
    fn test_resolve_nested() {
        let store = MemoryStore::new();
        let mut root = root_dir();

        let mut sub = NodeRecord::new_directory(0o755, Credentials::default());
        let mut file = NodeRecord::new_file(0o644, Credentials::default());
        file.size = 99;

        // Build /sub first so its record exists before /sub/f links into it.
        let sub_id = link(&store, &mut root, &ROOT_KEY, "sub", sub);
        sub = resolve(&store, &root, "/sub").unwrap();
        link(&store, &mut sub, &sub_id, "f", file);

        let resolved = resolve(&store, &root, "/sub/f").unwrap();
        assert!(resolved.is_file());
        assert_eq!(resolved.size, 99);
    }

    #[test]
    fn test_trailing_segment_under_file_resolves_to_file() {
        let store = MemoryStore::new();
        let mut root = root_dir();
        let file = NodeRecord::new_file(0o644, Credentials::default());
        link(&store, &mut root, &ROOT_KEY, "f", file);

        // One trailing segment under a file stops at the file itself.
        let resolved = resolve(&store, &root, "/f/anything").unwrap();
        assert!(resolved.is_file());

        // Two trailing segments are an error.
        assert!(matches!(
            resolve(&store, &root, "/f/a/b"),
            Err(KeyFsError::NotFound)
        ));
    }

    #[test]
    fn test_resolve_parent_at_root() {
        let store = MemoryStore::new();
        let root = root_dir();
        let (parent, parent_id) = resolve_parent(&store, &root, "/child").unwrap();
        assert_eq!(parent_id, ROOT_KEY);
        assert_eq!(parent, root);
    }

    #[test]
    fn test_resolve_parent_nested() {
        let store = MemoryStore::new();
        let mut root = root_dir();
        let sub = NodeRecord::new_directory(0o755, Credentials::default());
        let sub_id = link(&store, &mut root, &ROOT_KEY, "sub", sub);

        let (parent, parent_id) = resolve_parent(&store, &root, "/sub/new").unwrap();
        assert_eq!(parent_id, sub_id);
        assert!(parent.is_directory());
    }

    #[test]
    fn test_resolve_parent_of_root_rejected() {
        let store = MemoryStore::new();
        let root = root_dir();
        assert!(matches!(
            resolve_parent(&store, &root, "/"),
            Err(KeyFsError::InvalidName(_))
        ));
    }

    #[test]
    fn test_resolve_parent_through_file_rejected() {
        let store = MemoryStore::new();
        let mut root = root_dir();
        let file = NodeRecord::new_file(0o644, Credentials::default());
        link(&store, &mut root, &ROOT_KEY, "f", file);

        assert!(matches!(
            resolve_parent(&store, &root, "/f/child"),
            Err(KeyFsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_size_mismatch_aborts_resolution() {
        let store = MemoryStore::new();
        let mut root = root_dir();
        let file = NodeRecord::new_file(0o644, Credentials::default());
        link(&store, &mut root, &ROOT_KEY, "f", file);

        // Declare one more entry than the object holds.
        root.size += DIR_ENTRY_SIZE as u64;
        assert!(matches!(
            resolve(&store, &root, "/f"),
            Err(KeyFsError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_split_path() {
        assert!(split_path("/").is_empty());
        assert_eq!(split_path("/a/b"), vec!["a", "b"]);
        assert_eq!(split_path("//a//b/"), vec!["a", "b"]);
    }
}
