//! # KeyFs - Filesystem in a Key-Value Object Store
//!
//! `keyfs` persists a hierarchical file tree (directories, files,
//! POSIX-like metadata) entirely inside a flat key-value object store.
//! Every filesystem entry is a fixed-size binary node record; directory
//! and file contents live as independently-addressable variable-length
//! objects referenced from their nodes.
//!
//! - **Pluggable backends**: anything implementing [`ObjectStore`]
//!   (in-memory [`MemoryStore`], directory-backed [`DirStore`])
//! - **Fixed binary encoding**: 64-byte node records, 64-byte directory
//!   entry records, little-endian throughout
//! - **Dispatcher-ready surface**: getattr/readdir/mkdir/rmdir/create/
//!   read/write/truncate/chmod/chown/utimens/unlink with a POSIX-style
//!   error taxonomy
//!
//! ## Quick Start
//!
//! ```rust
//! use keyfs::{KeyFs, MemoryStore, Result};
//!
//! # fn main() -> Result<()> {
//! let mut fs = KeyFs::mount(MemoryStore::new())?;
//!
//! fs.make_directory("/documents", 0o755)?;
//! fs.create_file("/documents/report.txt", 0o644)?;
//! fs.write_file("/documents/report.txt", 0, b"Hello, World!")?;
//!
//! let content = fs.read_file("/documents/report.txt", 0, 13)?;
//! assert_eq!(content, b"Hello, World!");
//!
//! let entries = fs.list_directory("/documents")?;
//! assert_eq!(entries.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Persisted layout
//!
//! One well-known key holds the root node record; every other node and
//! content object is keyed by a randomly generated 128-bit id reachable
//! transitively from the root. There is no separate superblock —
//! filesystem existence is the presence of the root key.
//!
//! The engine is single-caller and synchronous: the external dispatcher
//! is expected to serialize operations. See [`KeyFs`] for details.

pub mod buffer;
pub mod dirent;
pub mod error;
pub mod fs;
pub mod node;
pub mod resolve;
pub mod store;

// Re-export commonly used types
pub use buffer::ContentBuffer;
pub use dirent::{DirEntry, DIR_ENTRY_SIZE, NAME_CAPACITY};
pub use error::{KeyFsError, Result, StoreError};
pub use fs::{FsStats, KeyFs, KeyFsBuilder, DEFAULT_MAX_OBJECT_SIZE};
pub use node::{Credentials, NodeAttributes, NodeKind, NodeRecord, NODE_RECORD_SIZE};
pub use store::{DirStore, MemoryStore, ObjectId, ObjectStore, KEY_SIZE, ROOT_KEY};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
