//! Bounded, memory-mapped file access.
//!
//! `MappedFile` maps a file read-only and hands out its contents as a
//! `bytes::Bytes`, so every section and data block the accessor layer
//! produces is a cheap, reference-counted view into the same mapping.
//! The mapping is released once the last view is dropped.

pub mod error;

use crate::io::error::{IoError, Result};
use bytes::Bytes;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Defines the resource limits for opening files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IOLimits {
    /// The absolute maximum file size that can be opened.
    pub max_file_size: u64,
}

impl Default for IOLimits {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// A read-only, size-limited file mapping.
#[derive(Debug, Clone)]
pub struct MappedFile {
    path: PathBuf,
    bytes: Bytes,
}

impl MappedFile {
    /// Opens and memory-maps a file.
    ///
    /// Fails if the file size exceeds `limits.max_file_size`.
    pub fn open<P: AsRef<Path>>(path: P, limits: &IOLimits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size = file_size,
            limits.max_file_size = limits.max_file_size,
            "Mapping file"
        );

        if file_size > limits.max_file_size {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = limits.max_file_size,
                "File is too large"
            );
            return Err(IoError::FileTooLarge {
                limit: limits.max_file_size,
                found: file_size,
            });
        }

        // memmap cannot map empty files
        let bytes = if file_size == 0 {
            Bytes::new()
        } else {
            // Safety: read-only map of a regular file; the crate never writes through it.
            let mmap = unsafe { Mmap::map(&file)? };
            Bytes::from_owner(mmap)
        };

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    /// Wraps an in-memory buffer as if it had been mapped from `path`.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The whole file as a shared buffer.
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}
