//! Filesystem engine over an object store.
//!
//! [`KeyFs`] owns a store backend, the caller credentials, and the cached
//! root record. Every dispatcher-facing operation resolves a path (or its
//! parent) to a node, fetches the record, mutates the directory or file
//! content object, and re-stores the updated records. The root cache is
//! synchronized through one choke point ([`KeyFs::persist_node`]) so the
//! in-handle copy can never drift from the store.

use crate::buffer::ContentBuffer;
use crate::dirent::{self, DirEntry, DIR_ENTRY_SIZE};
use crate::error::{KeyFsError, Result, StoreError};
use crate::node::{unix_now, Credentials, NodeAttributes, NodeKind, NodeRecord, NODE_RECORD_SIZE};
use crate::resolve::{self, fetch_entries, fetch_node};
use crate::store::{ObjectId, ObjectStore, ROOT_KEY};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Default cap on a single content object (4 MiB).
pub const DEFAULT_MAX_OBJECT_SIZE: u64 = 4 * 1024 * 1024;

const ROOT_MODE: u32 = 0o755;

/// Builder for mounting a filesystem with non-default options.
#[derive(Debug, Clone)]
pub struct KeyFsBuilder {
    creds: Credentials,
    max_object_size: u64,
}

impl KeyFsBuilder {
    pub fn new() -> Self {
        KeyFsBuilder {
            creds: Credentials::default(),
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
        }
    }

    /// Identity stamped onto nodes created through this handle.
    pub fn credentials(mut self, uid: u32, gid: u32) -> Self {
        self.creds = Credentials::new(uid, gid);
        self
    }

    /// Upper bound on any single content object, and therefore on file
    /// size.
    pub fn max_object_size(mut self, bytes: u64) -> Self {
        self.max_object_size = bytes;
        self
    }

    /// Mounts the filesystem held in `store`, bootstrapping the root node
    /// when the store is empty.
    pub fn mount<S: ObjectStore>(self, store: S) -> Result<KeyFs<S>> {
        let root = bootstrap_root(&store, self.creds)?;
        Ok(KeyFs {
            store,
            root,
            creds: self.creds,
            max_object_size: self.max_object_size,
        })
    }
}

impl Default for KeyFsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetches or creates the root node under its well-known key.
///
/// A root record with the wrong length means the store is damaged; that
/// is fatal here rather than something to limp past.
fn bootstrap_root<S: ObjectStore>(store: &S, creds: Credentials) -> Result<NodeRecord> {
    match store.fetch(&ROOT_KEY) {
        Ok(bytes) => {
            if bytes.len() != NODE_RECORD_SIZE {
                warn!(
                    found = bytes.len(),
                    expected = NODE_RECORD_SIZE,
                    "root record has unexpected length, refusing to mount"
                );
                return Err(KeyFsError::SizeMismatch {
                    expected: NODE_RECORD_SIZE as u64,
                    found: bytes.len() as u64,
                });
            }
            NodeRecord::from_bytes(&bytes)
        }
        Err(StoreError::NotFound) => {
            info!("root node not found, initializing fresh filesystem");
            let root = NodeRecord::new_directory(ROOT_MODE, creds);
            store.store(&ROOT_KEY, &root.to_bytes())?;
            Ok(root)
        }
        Err(e) => Err(e.into()),
    }
}

/// A node located through its parent: everything a mutation needs in one
/// resolve pass.
struct Located {
    parent: NodeRecord,
    parent_id: ObjectId,
    entries: Vec<DirEntry>,
    index: usize,
    node: NodeRecord,
}

impl Located {
    fn node_id(&self) -> ObjectId {
        self.entries[self.index].node
    }
}

/// Static engine parameters, for embedder introspection.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FsStats {
    pub max_object_size: u64,
    pub node_record_size: usize,
    pub dir_entry_size: usize,
}

/// Filesystem engine handle.
///
/// Single caller, synchronous: the design assumes the external dispatcher
/// serializes operations. Sharing one store between two handles is a
/// lost-update race.
pub struct KeyFs<S: ObjectStore> {
    store: S,
    root: NodeRecord,
    creds: Credentials,
    max_object_size: u64,
}

impl<S: ObjectStore> KeyFs<S> {
    /// Mounts with default options. See [`KeyFsBuilder`] for the rest.
    pub fn mount(store: S) -> Result<Self> {
        KeyFsBuilder::new().mount(store)
    }

    pub fn builder() -> KeyFsBuilder {
        KeyFsBuilder::new()
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> FsStats {
        FsStats {
            max_object_size: self.max_object_size,
            node_record_size: NODE_RECORD_SIZE,
            dir_entry_size: DIR_ENTRY_SIZE,
        }
    }

    /// Attributes of "/", answered from the cached root without a store
    /// round trip.
    pub fn root_attributes(&self) -> NodeAttributes {
        self.root.attributes()
    }

    // ------------------------------------------------------------------
    // Lookup / stat
    // ------------------------------------------------------------------

    /// Resolves `path` and returns the node's attributes.
    pub fn get_attributes(&self, path: &str) -> Result<NodeAttributes> {
        debug!(path, "getattr");
        if resolve::split_path(path).is_empty() {
            return Ok(self.root.attributes());
        }
        let node = resolve::resolve(&self.store, &self.root, path)?;
        Ok(node.attributes())
    }

    /// Lists a directory, fetching each referenced node's attributes.
    pub fn list_directory(&self, path: &str) -> Result<Vec<(String, NodeAttributes)>> {
        debug!(path, "readdir");
        let node = resolve::resolve(&self.store, &self.root, path)?;
        if !node.is_directory() {
            return Err(KeyFsError::NotADirectory(path.to_string()));
        }
        let entries = fetch_entries(&self.store, &node)?;
        let mut listing = Vec::with_capacity(entries.len());
        for entry in entries {
            let child = fetch_node(&self.store, &entry.node)?;
            listing.push((entry.name, child.attributes()));
        }
        Ok(listing)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Creates a directory at `path`.
    pub fn make_directory(&mut self, path: &str, mode: u32) -> Result<NodeAttributes> {
        debug!(path, mode, "mkdir");
        self.create_node(path, NodeKind::Directory, mode)
    }

    /// Creates an empty regular file at `path`.
    pub fn create_file(&mut self, path: &str, mode: u32) -> Result<NodeAttributes> {
        debug!(path, mode, "create");
        self.create_node(path, NodeKind::RegularFile, mode)
    }

    fn create_node(&mut self, path: &str, kind: NodeKind, mode: u32) -> Result<NodeAttributes> {
        let (parent, parent_id) = resolve::resolve_parent(&self.store, &self.root, path)?;
        let (_, name) = resolve::split_parent(path)?;
        dirent::validate_name(name)?;

        let entries = fetch_entries(&self.store, &parent)?;
        if dirent::find_entry(&entries, name).is_some() {
            return Err(KeyFsError::AlreadyExists(name.to_string()));
        }

        let node = match kind {
            NodeKind::Directory => NodeRecord::new_directory(mode, self.creds),
            NodeKind::RegularFile => NodeRecord::new_file(mode, self.creds),
        };
        let node_id = ObjectId::generate();
        self.store.store(&node_id, &node.to_bytes())?;

        let entry = DirEntry::new(name, node_id)?;
        self.append_entry(parent, parent_id, &entry)?;
        Ok(node.attributes())
    }

    /// Appends one entry to a directory's content object, creating the
    /// object on first growth, and re-stores the bumped parent record.
    fn append_entry(
        &mut self,
        mut parent: NodeRecord,
        parent_id: ObjectId,
        entry: &DirEntry,
    ) -> Result<()> {
        if parent.content_ref.is_nil() {
            parent.content_ref = ObjectId::generate();
        }
        self.store.append(&parent.content_ref, &entry.to_bytes())?;
        parent.size += DIR_ENTRY_SIZE as u64;
        parent.touch();
        self.persist_node(&parent_id, &parent)
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Removes an empty directory.
    pub fn remove_directory(&mut self, path: &str) -> Result<()> {
        debug!(path, "rmdir");
        let located = self.locate(path)?;
        if !located.node.is_directory() {
            return Err(KeyFsError::NotADirectory(path.to_string()));
        }
        if located.node.size != 0 {
            return Err(KeyFsError::NotEmpty(path.to_string()));
        }
        self.remove_located(located)
    }

    /// Removes a regular file and its content.
    pub fn unlink_file(&mut self, path: &str) -> Result<()> {
        debug!(path, "unlink");
        let located = self.locate(path)?;
        if located.node.is_directory() {
            return Err(KeyFsError::IsADirectory(path.to_string()));
        }
        self.remove_located(located)
    }

    /// Unlinks the parent entry (swap-with-last compaction), then deletes
    /// the target's record and content object. The entry goes first so a
    /// node is never destroyed while a directory still references it.
    fn remove_located(&mut self, located: Located) -> Result<()> {
        let Located {
            mut parent,
            parent_id,
            mut entries,
            index,
            node,
        } = located;
        let node_id = entries[index].node;

        if entries.len() == 1 {
            self.store.delete(&parent.content_ref)?;
            parent.content_ref = ObjectId::NIL;
        } else {
            entries.swap_remove(index);
            self.store
                .store(&parent.content_ref, &dirent::encode_entries(&entries))?;
        }
        parent.size -= DIR_ENTRY_SIZE as u64;
        parent.touch();
        self.persist_node(&parent_id, &parent)?;

        if !node.content_ref.is_nil() {
            self.store.delete(&node.content_ref)?;
        }
        self.store.delete(&node_id)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // File content
    // ------------------------------------------------------------------

    /// Opens a file. Permission bits are stored but never checked, so
    /// this is a lookup plus a kind check.
    pub fn open_file(&self, path: &str) -> Result<()> {
        debug!(path, "open");
        let node = resolve::resolve(&self.store, &self.root, path)?;
        if node.is_directory() {
            return Err(KeyFsError::IsADirectory(path.to_string()));
        }
        Ok(())
    }

    /// Reads up to `length` bytes from `offset`, clipped to the file.
    /// Reading at or past the end yields an empty buffer, never an error.
    pub fn read_file(&self, path: &str, offset: u64, length: usize) -> Result<Vec<u8>> {
        debug!(path, offset, length, "read");
        let node = resolve::resolve(&self.store, &self.root, path)?;
        if node.is_directory() {
            return Err(KeyFsError::IsADirectory(path.to_string()));
        }
        if offset >= node.size {
            return Ok(Vec::new());
        }
        let content = self.fetch_content(&node)?;
        Ok(content.read_at(offset as usize, length).to_vec())
    }

    /// Writes `data` at `offset`, growing the file when the write lands
    /// past the current end; any gap reads back as zeros. Returns the
    /// number of bytes written.
    pub fn write_file(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<usize> {
        debug!(path, offset, len = data.len(), "write");
        if offset >= self.max_object_size {
            return Err(KeyFsError::InvalidOffset {
                offset,
                max: self.max_object_size,
            });
        }
        let end = offset + data.len() as u64;
        if end > self.max_object_size {
            return Err(KeyFsError::TooLarge {
                size: end,
                max: self.max_object_size,
            });
        }
        let located = self.locate(path)?;
        if located.node.is_directory() {
            return Err(KeyFsError::IsADirectory(path.to_string()));
        }
        if data.is_empty() {
            return Ok(0);
        }
        let node_id = located.node_id();
        let mut node = located.node;

        let mut content = self.fetch_content(&node)?;
        content.write_at(offset as usize, data);

        if node.content_ref.is_nil() {
            node.content_ref = ObjectId::generate();
        }
        self.store.store(&node.content_ref, content.as_slice())?;

        node.size = node.size.max(end);
        node.touch();
        self.persist_node(&node_id, &node)?;
        Ok(data.len())
    }

    /// Sets a file's length: grown regions are zero-filled, shrinking
    /// keeps the prefix.
    pub fn truncate_file(&mut self, path: &str, new_size: u64) -> Result<()> {
        debug!(path, new_size, "truncate");
        if new_size > self.max_object_size {
            return Err(KeyFsError::TooLarge {
                size: new_size,
                max: self.max_object_size,
            });
        }

        let located = self.locate(path)?;
        if located.node.is_directory() {
            return Err(KeyFsError::IsADirectory(path.to_string()));
        }
        let node_id = located.node_id();
        let mut node = located.node;

        if new_size == node.size {
            return Ok(());
        }

        let mut content = self.fetch_content(&node)?;
        content.resize(new_size as usize);

        if node.content_ref.is_nil() {
            node.content_ref = ObjectId::generate();
        }
        self.store.store(&node.content_ref, content.as_slice())?;

        node.size = new_size;
        node.touch();
        self.persist_node(&node_id, &node)
    }

    /// Fetches a node's content object, probing the stored length against
    /// the declared size before copying the payload out.
    fn fetch_content(&self, node: &NodeRecord) -> Result<ContentBuffer> {
        if node.content_ref.is_nil() {
            if node.size != 0 {
                return Err(KeyFsError::SizeMismatch {
                    expected: node.size,
                    found: 0,
                });
            }
            return Ok(ContentBuffer::new());
        }
        let stored = self.store.len(&node.content_ref)?;
        if stored != node.size {
            warn!(
                declared = node.size,
                stored,
                "content object length disagrees with node size"
            );
            return Err(KeyFsError::SizeMismatch {
                expected: node.size,
                found: stored,
            });
        }
        Ok(ContentBuffer::from_vec(self.store.fetch(&node.content_ref)?))
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Sets the modification time; the change time is refreshed.
    pub fn set_modification_time(&mut self, path: &str, mtime: i64) -> Result<NodeAttributes> {
        debug!(path, mtime, "utimens");
        self.update_node(path, |node| {
            node.mtime = mtime;
            node.ctime = unix_now();
        })
    }

    /// Replaces the permission bits, preserving the kind flag.
    pub fn set_mode(&mut self, path: &str, mode: u32) -> Result<NodeAttributes> {
        debug!(path, mode, "chmod");
        self.update_node(path, |node| {
            node.mode = (node.mode & crate::node::MODE_KIND_MASK)
                | (mode & !crate::node::MODE_KIND_MASK);
            node.ctime = unix_now();
        })
    }

    /// Replaces owner and group.
    pub fn set_owner(&mut self, path: &str, uid: u32, gid: u32) -> Result<NodeAttributes> {
        debug!(path, uid, gid, "chown");
        self.update_node(path, |node| {
            node.uid = uid;
            node.gid = gid;
            node.ctime = unix_now();
        })
    }

    /// No-op; nothing is buffered outside the store.
    pub fn flush(&self, path: &str) -> Result<()> {
        debug!(path, "flush");
        Ok(())
    }

    /// No-op companion to [`KeyFs::open_file`].
    pub fn release(&self, path: &str) -> Result<()> {
        debug!(path, "release");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// One resolve-and-update pass shared by every attribute mutation.
    /// Works on "/" too: the root record and its cache move together.
    fn update_node<F>(&mut self, path: &str, mutate: F) -> Result<NodeAttributes>
    where
        F: FnOnce(&mut NodeRecord),
    {
        if resolve::split_path(path).is_empty() {
            let mut root = self.root;
            mutate(&mut root);
            self.persist_node(&ROOT_KEY, &root)?;
            return Ok(root.attributes());
        }

        let located = self.locate(path)?;
        let node_id = located.node_id();
        let mut node = located.node;
        mutate(&mut node);
        self.persist_node(&node_id, &node)?;
        Ok(node.attributes())
    }

    /// Resolves `path` through its parent, returning parent, entry slot,
    /// and target node in one pass.
    fn locate(&self, path: &str) -> Result<Located> {
        let (parent, parent_id) = resolve::resolve_parent(&self.store, &self.root, path)?;
        let (_, name) = resolve::split_parent(path)?;
        let entries = fetch_entries(&self.store, &parent)?;
        let index = dirent::find_entry(&entries, name).ok_or(KeyFsError::NotFound)?;
        let node = fetch_node(&self.store, &entries[index].node)?;
        Ok(Located {
            parent,
            parent_id,
            entries,
            index,
            node,
        })
    }

    /// Stores a node record, mirroring the write into the root cache when
    /// the record is the root. Every mutation funnels through here; the
    /// cache cannot drift.
    fn persist_node(&mut self, id: &ObjectId, node: &NodeRecord) -> Result<()> {
        self.store.store(id, &node.to_bytes())?;
        if *id == ROOT_KEY {
            self.root = *node;
        }
        Ok(())
    }
}
