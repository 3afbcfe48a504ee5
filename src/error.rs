use thiserror::Error;

/// Failures raised by an object-store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt object: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by filesystem operations.
///
/// Each variant is one POSIX-style error category; the dispatcher maps
/// them onto its numeric codes.
#[derive(Error, Debug)]
pub enum KeyFsError {
    #[error("no such file or directory")]
    NotFound,

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    #[error("object too large: {size} bytes exceeds maximum of {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("invalid write offset {offset}: exceeds maximum object size {max}")]
    InvalidOffset { offset: u64, max: u64 },

    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    #[error("name too long: {0}")]
    NameTooLong(String),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("stored length {found} does not match declared size {expected}")]
    SizeMismatch { expected: u64, found: u64 },

    #[error("object store failure: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, KeyFsError>;
