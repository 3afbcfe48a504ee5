//! Directory content codec: packed fixed-size entry records.
//!
//! A directory's content object is the dense concatenation of 64-byte
//! entry records, each a zero-padded name plus the referenced node id.
//! Order is insignificant; removal compacts by swapping the last record
//! into the vacated slot, so entry position is never a stable identity.

use crate::error::{KeyFsError, Result};
use crate::store::{ObjectId, KEY_SIZE};

/// Maximum byte length of an entry name.
pub const NAME_CAPACITY: usize = 48;

/// Encoded length of one directory entry record.
pub const DIR_ENTRY_SIZE: usize = NAME_CAPACITY + KEY_SIZE;

/// One `(name, node id)` pair inside a directory's content object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub node: ObjectId,
}

/// Validates a path segment used as an entry name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\0') {
        return Err(KeyFsError::InvalidName(name.to_string()));
    }
    if name.len() > NAME_CAPACITY {
        return Err(KeyFsError::NameTooLong(name.to_string()));
    }
    Ok(())
}

impl DirEntry {
    pub fn new(name: impl Into<String>, node: ObjectId) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(DirEntry { name, node })
    }

    /// Serializes the entry to its fixed binary record.
    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut bytes = [0u8; DIR_ENTRY_SIZE];
        bytes[..self.name.len()].copy_from_slice(self.name.as_bytes());
        bytes[NAME_CAPACITY..].copy_from_slice(self.node.as_bytes());
        bytes
    }

    /// Deserializes one entry record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != DIR_ENTRY_SIZE {
            return Err(KeyFsError::SizeMismatch {
                expected: DIR_ENTRY_SIZE as u64,
                found: bytes.len() as u64,
            });
        }

        let name_bytes = &bytes[..NAME_CAPACITY];
        let end = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_CAPACITY);
        let name = std::str::from_utf8(&name_bytes[..end])
            .map_err(|_| KeyFsError::InvalidName(String::from_utf8_lossy(name_bytes).into_owned()))?
            .to_string();

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes[NAME_CAPACITY..]);

        Ok(DirEntry {
            name,
            node: ObjectId::from_bytes(key),
        })
    }
}

/// Decodes a packed entries object.
pub fn decode_entries(bytes: &[u8]) -> Result<Vec<DirEntry>> {
    if bytes.len() % DIR_ENTRY_SIZE != 0 {
        return Err(KeyFsError::SizeMismatch {
            expected: (bytes.len() - bytes.len() % DIR_ENTRY_SIZE) as u64,
            found: bytes.len() as u64,
        });
    }
    bytes.chunks(DIR_ENTRY_SIZE).map(DirEntry::from_bytes).collect()
}

/// Encodes entries back into a packed object.
pub fn encode_entries(entries: &[DirEntry]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(entries.len() * DIR_ENTRY_SIZE);
    for entry in entries {
        bytes.extend_from_slice(&entry.to_bytes());
    }
    bytes
}

/// Index of the entry named `name`, by linear scan.
pub fn find_entry(entries: &[DirEntry], name: &str) -> Option<usize> {
    entries.iter().position(|e| e.name == name)
}
