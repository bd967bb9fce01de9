//! Static archives as a lazy sequence of ELF files.

use crate::config::GraphConfig;
use crate::error::{ElfGraphError, Result};
use crate::formats::elf::{is_archive, ArchiveReader, ElfClass};
use crate::graph::file::ElfFile;
use crate::io::MappedFile;
use crate::{log_error, span_trace};
use bytes::Bytes;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An `ar` archive of ELF objects.
#[derive(Debug)]
pub struct Archive {
    path: Option<PathBuf>,
    config: GraphConfig,
    reader: ArchiveReader,
}

impl Archive {
    /// Open an archive. Every member is read as `class` when given.
    pub fn open<P: AsRef<Path>>(path: P, class: Option<ElfClass>) -> Result<Self> {
        let config = GraphConfig {
            class_override: class,
            ..GraphConfig::default()
        };
        Self::open_with(path, &config)
    }

    pub fn open_with<P: AsRef<Path>>(path: P, config: &GraphConfig) -> Result<Self> {
        let path = path.as_ref();
        let _span = span_trace!("open_archive", path = %path.display()).entered();
        let mapped = MappedFile::open(path, &config.io)?;
        let mut archive = Self::with_config(mapped.bytes(), config)?;
        archive.path = Some(path.to_path_buf());
        Ok(archive)
    }

    pub fn from_bytes(bytes: impl Into<Bytes>, class: Option<ElfClass>) -> Result<Self> {
        let config = GraphConfig {
            class_override: class,
            ..GraphConfig::default()
        };
        Self::with_config(bytes.into(), &config)
    }

    fn with_config(bytes: Bytes, config: &GraphConfig) -> Result<Self> {
        if !is_archive(&bytes) {
            return Err(log_error!(ElfGraphError::InvalidInput(
                "not an ar archive".to_string()
            )));
        }
        let reader = ArchiveReader::parse(bytes)?;
        Ok(Self {
            path: None,
            config: config.clone(),
            reader,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// ELF members not yet opened
    pub fn len(&self) -> usize {
        self.reader.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the ELF members in archive order.
    ///
    /// Each member is opened only when the iterator reaches it and carries
    /// its member header (`ElfFile::arhdr`). The archive is released once
    /// the iterator is exhausted or dropped.
    pub fn elfs(self) -> ArchiveMembers {
        ArchiveMembers {
            reader: self.reader,
            config: self.config,
        }
    }
}

impl IntoIterator for Archive {
    type Item = Result<ElfFile>;
    type IntoIter = ArchiveMembers;

    fn into_iter(self) -> ArchiveMembers {
        self.elfs()
    }
}

/// Iterator returned by `Archive::elfs`.
#[derive(Debug)]
pub struct ArchiveMembers {
    reader: ArchiveReader,
    config: GraphConfig,
}

impl Iterator for ArchiveMembers {
    type Item = Result<ElfFile>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.open_member() {
            Ok(Some(image)) => Some(ElfFile::with_config(Box::new(image), &self.config)),
            Ok(None) => None,
            Err(err) => {
                self.reader.close();
                Some(Err(log_error!(ElfGraphError::from(err), "archive member")))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.reader.remaining()))
    }
}

impl FusedIterator for ArchiveMembers {}

impl Drop for ArchiveMembers {
    fn drop(&mut self) {
        if !self.reader.is_closed() {
            debug!(remaining = self.reader.remaining(), "Dropping unfinished archive iterator");
            self.reader.close();
        }
    }
}
