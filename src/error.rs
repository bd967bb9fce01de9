//! Error types for the elfgraph object graph.
//!
//! Structural and relationship errors are raised to the immediate caller.
//! A missed symbol-name lookup is not an error; it is reported as `None`.

use crate::formats::elf::ElfError;
use crate::io::error::IoError;
use thiserror::Error;

/// Main error type for graph operations.
#[derive(Debug, Error)]
pub enum ElfGraphError {
    /// A file or archive was constructed from something it cannot open
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Attribute access on a node that wraps no raw structure
    #[error("{node} does not wrap an addressable structure (attribute `{name}`)")]
    NotAddressable { node: String, name: String },

    /// The wrapped raw structure has no such field
    #[error("{node} has no attribute `{name}`")]
    UnknownAttribute { node: String, name: String },

    /// Operation not valid for this kind of node
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A link/info/section reference that does not apply or does not resolve
    #[error("Missing relationship: {0}")]
    MissingRelationship(String),

    /// More than one section claims a dereferenced address range
    #[error("Sections {sections:?} overlap address range {start:#x}..{end:#x}")]
    OverlapViolation {
        start: u64,
        end: u64,
        sections: Vec<String>,
    },

    /// The file has been closed
    #[error("File already closed")]
    Closed,

    /// Errors reported by the accessor layer
    #[error("ELF format error: {0}")]
    Format(#[from] ElfError),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Releasing the underlying handle failed
    #[error("Teardown failed: {0}")]
    Teardown(String),
}

impl From<std::io::Error> for ElfGraphError {
    fn from(err: std::io::Error) -> Self {
        ElfGraphError::Io(IoError::StdIo(err))
    }
}

/// Result type alias for graph operations
pub type Result<T> = std::result::Result<T, ElfGraphError>;
