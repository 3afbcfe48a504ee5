//! Object store adapter
//!
//! The engine persists everything — node records, directory entry blobs,
//! file contents — as independently-addressable binary objects behind the
//! [`ObjectStore`] trait. Keys are fixed-length 128-bit identifiers; one
//! distinguished all-zero id means "no object".

mod dir;
mod memory;

pub use dir::DirStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length in bytes of an object key.
pub const KEY_SIZE: usize = 16;

/// Key of the root node record.
///
/// Every other node is keyed by a generated v4 id; v4 ids always carry
/// version and variant bits, so the all-ones key cannot collide with one.
pub const ROOT_KEY: ObjectId = ObjectId::from_bytes([0xff; KEY_SIZE]);

/// Identifier of one stored object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// The distinguished "no object" id (all zero bits).
    pub const NIL: ObjectId = ObjectId(Uuid::nil());

    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Builds an id from its raw key bytes.
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }

    /// True for the "no object" id.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// 32-character lowercase hex form, used as the on-disk file stem by
    /// [`DirStore`].
    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Narrow interface over the key-value backend.
///
/// `append` creates the object when absent; the engine relies on that for
/// first-entry directory growth. All methods take `&self` — backends use
/// interior mutability so a store can be shared with an external reader.
pub trait ObjectStore {
    /// Fetches the full payload of an object.
    fn fetch(&self, id: &ObjectId) -> Result<Vec<u8>, StoreError>;

    /// Stores an object, replacing any previous payload.
    fn store(&self, id: &ObjectId, data: &[u8]) -> Result<(), StoreError>;

    /// Appends bytes to an object, creating it when absent.
    fn append(&self, id: &ObjectId, data: &[u8]) -> Result<(), StoreError>;

    /// Deletes an object.
    fn delete(&self, id: &ObjectId) -> Result<(), StoreError>;

    /// Returns the payload length without copying the payload out.
    fn len(&self, id: &ObjectId) -> Result<u64, StoreError>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for Box<S> {
    fn fetch(&self, id: &ObjectId) -> Result<Vec<u8>, StoreError> {
        (**self).fetch(id)
    }

    fn store(&self, id: &ObjectId, data: &[u8]) -> Result<(), StoreError> {
        (**self).store(id, data)
    }

    fn append(&self, id: &ObjectId, data: &[u8]) -> Result<(), StoreError> {
        (**self).append(id, data)
    }

    fn delete(&self, id: &ObjectId) -> Result<(), StoreError> {
        (**self).delete(id)
    }

    fn len(&self, id: &ObjectId) -> Result<u64, StoreError> {
        (**self).len(id)
    }
}

// A shared reference to a store is itself a store; the engine can be
// mounted over `&S` when something else also holds the backend.
impl<S: ObjectStore> ObjectStore for &S {
    fn fetch(&self, id: &ObjectId) -> Result<Vec<u8>, StoreError> {
        (**self).fetch(id)
    }

    fn store(&self, id: &ObjectId, data: &[u8]) -> Result<(), StoreError> {
        (**self).store(id, data)
    }

    fn append(&self, id: &ObjectId, data: &[u8]) -> Result<(), StoreError> {
        (**self).append(id, data)
    }

    fn delete(&self, id: &ObjectId) -> Result<(), StoreError> {
        (**self).delete(id)
    }

    fn len(&self, id: &ObjectId) -> Result<u64, StoreError> {
        (**self).len(id)
    }
}
