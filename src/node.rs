//! Node records: fixed-size metadata for one filesystem entry.
//!
//! A node is the stored analogue of an inode: kind and permission bits,
//! ownership, timestamps, logical size, and the id of the content object
//! (packed directory entries or raw file bytes). Records are encoded
//! little-endian at a fixed 64-byte length so a wrong-length fetch is
//! immediately recognizable as corruption.

use crate::dirent::DIR_ENTRY_SIZE;
use crate::error::{KeyFsError, Result};
use crate::store::{ObjectId, KEY_SIZE};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Encoded length of a node record in the store.
pub const NODE_RECORD_SIZE: usize = 64;

/// Kind flag for directories within the mode field.
pub const MODE_DIRECTORY: u32 = 0o040000;
/// Kind flag for regular files within the mode field.
pub const MODE_REGULAR: u32 = 0o100000;
/// Mask covering the kind flags.
pub const MODE_KIND_MASK: u32 = 0o170000;

/// Caller identity stamped onto newly created nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
}

impl Credentials {
    pub fn new(uid: u32, gid: u32) -> Self {
        Credentials { uid, gid }
    }
}

/// Node kind, as carried by the mode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Directory,
    RegularFile,
}

/// One filesystem entry's metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    /// Kind flag OR'd with permission bits.
    pub mode: u32,

    /// Owning user id.
    pub uid: u32,

    /// Owning group id.
    pub gid: u32,

    /// Last content modification (Unix seconds).
    pub mtime: i64,

    /// Last record change (Unix seconds).
    pub ctime: i64,

    /// Logical byte length: content length for files, `entry_count *
    /// DIR_ENTRY_SIZE` for directories.
    pub size: u64,

    /// Id of the content object, [`ObjectId::NIL`] when none exists yet.
    pub content_ref: ObjectId,
}

/// Current wall-clock time in Unix seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

impl NodeRecord {
    /// Creates a directory record with no content object.
    pub fn new_directory(mode: u32, creds: Credentials) -> Self {
        Self::new(MODE_DIRECTORY | (mode & !MODE_KIND_MASK), creds)
    }

    /// Creates a regular-file record with no content object.
    pub fn new_file(mode: u32, creds: Credentials) -> Self {
        Self::new(MODE_REGULAR | (mode & !MODE_KIND_MASK), creds)
    }

    fn new(mode: u32, creds: Credentials) -> Self {
        let now = unix_now();
        NodeRecord {
            mode,
            uid: creds.uid,
            gid: creds.gid,
            mtime: now,
            ctime: now,
            size: 0,
            content_ref: ObjectId::NIL,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.mode & MODE_KIND_MASK == MODE_DIRECTORY
    }

    pub fn is_file(&self) -> bool {
        self.mode & MODE_KIND_MASK == MODE_REGULAR
    }

    pub fn kind(&self) -> NodeKind {
        if self.is_directory() {
            NodeKind::Directory
        } else {
            NodeKind::RegularFile
        }
    }

    /// Number of directory entries implied by `size`.
    pub fn entry_count(&self) -> usize {
        (self.size / DIR_ENTRY_SIZE as u64) as usize
    }

    /// Refreshes both timestamps to now.
    pub fn touch(&mut self) {
        let now = unix_now();
        self.mtime = now;
        self.ctime = now;
    }

    /// Public attribute view for the dispatcher.
    pub fn attributes(&self) -> NodeAttributes {
        NodeAttributes {
            kind: self.kind(),
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
            mtime: self.mtime,
            ctime: self.ctime,
            size: self.size,
        }
    }

    /// Serializes the record to its fixed binary form.
    pub fn to_bytes(&self) -> [u8; NODE_RECORD_SIZE] {
        let mut bytes = [0u8; NODE_RECORD_SIZE];
        let mut offset = 0;

        bytes[offset..offset + 4].copy_from_slice(&self.mode.to_le_bytes());
        offset += 4;
        bytes[offset..offset + 4].copy_from_slice(&self.uid.to_le_bytes());
        offset += 4;
        bytes[offset..offset + 4].copy_from_slice(&self.gid.to_le_bytes());
        offset += 4;
        bytes[offset..offset + 8].copy_from_slice(&self.mtime.to_le_bytes());
        offset += 8;
        bytes[offset..offset + 8].copy_from_slice(&self.ctime.to_le_bytes());
        offset += 8;
        bytes[offset..offset + 8].copy_from_slice(&self.size.to_le_bytes());
        offset += 8;
        bytes[offset..offset + KEY_SIZE].copy_from_slice(self.content_ref.as_bytes());
        // Remaining 12 bytes are reserved and stay zero.

        bytes
    }

    /// Deserializes a record, rejecting any other length as corruption.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NODE_RECORD_SIZE {
            return Err(KeyFsError::SizeMismatch {
                expected: NODE_RECORD_SIZE as u64,
                found: bytes.len() as u64,
            });
        }

        let mut offset = 0;
        let mode = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let uid = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let gid = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let mtime = i64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
        offset += 8;
        let ctime = i64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
        offset += 8;
        let size = u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
        offset += 8;
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes[offset..offset + KEY_SIZE]);

        Ok(NodeRecord {
            mode,
            uid,
            gid,
            mtime,
            ctime,
            size,
            content_ref: ObjectId::from_bytes(key),
        })
    }
}

/// Dispatcher-facing view of a node's metadata.
///
/// This is what `getAttributes` returns; the dispatcher fills its stat
/// structure from these fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub kind: NodeKind,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: i64,
    pub ctime: i64,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const _: () = assert!(NODE_RECORD_SIZE == 4 + 4 + 4 + 8 + 8 + 8 + KEY_SIZE + 12);

    #[test]
    fn test_new_directory() {
        let node = NodeRecord::new_directory(0o755, Credentials::new(1000, 1000));
        assert!(node.is_directory());
        assert!(!node.is_file());
        assert_eq!(node.mode, MODE_DIRECTORY | 0o755);
        assert_eq!(node.uid, 1000);
        assert_eq!(node.size, 0);
        assert!(node.content_ref.is_nil());
    }

    #[test]
    fn test_new_file() {
        let node = NodeRecord::new_file(0o644, Credentials::default());
        assert!(node.is_file());
        assert_eq!(node.kind(), NodeKind::RegularFile);
        assert_eq!(node.mode, MODE_REGULAR | 0o644);
    }

    #[test]
    fn test_kind_bits_stripped_from_requested_mode() {
        // A caller passing kind bits in `mode` must not flip the kind.
        let node = NodeRecord::new_file(MODE_DIRECTORY | 0o600, Credentials::default());
        assert!(node.is_file());
        assert_eq!(node.mode & !MODE_KIND_MASK, 0o600);
    }

    #[test]
    fn test_round_trip() {
        let mut node = NodeRecord::new_file(0o640, Credentials::new(7, 42));
        node.size = 1234;
        node.content_ref = ObjectId::generate();

        let bytes = node.to_bytes();
        assert_eq!(bytes.len(), NODE_RECORD_SIZE);

        let decoded = NodeRecord::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let node = NodeRecord::new_file(0o644, Credentials::default());
        let bytes = node.to_bytes();

        assert!(matches!(
            NodeRecord::from_bytes(&bytes[..NODE_RECORD_SIZE - 1]),
            Err(KeyFsError::SizeMismatch { .. })
        ));
        let mut long = bytes.to_vec();
        long.push(0);
        assert!(matches!(
            NodeRecord::from_bytes(&long),
            Err(KeyFsError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_entry_count() {
        let mut node = NodeRecord::new_directory(0o755, Credentials::default());
        assert_eq!(node.entry_count(), 0);
        node.size = 3 * DIR_ENTRY_SIZE as u64;
        assert_eq!(node.entry_count(), 3);
    }

    #[test]
    fn test_attributes_view() {
        let mut node = NodeRecord::new_directory(0o700, Credentials::new(5, 6));
        node.size = 128;
        let attrs = node.attributes();
        assert_eq!(attrs.kind, NodeKind::Directory);
        assert_eq!(attrs.uid, 5);
        assert_eq!(attrs.gid, 6);
        assert_eq!(attrs.size, 128);
    }
}
