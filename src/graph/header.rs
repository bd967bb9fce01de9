//! Header views: file header, section headers and archive member headers.
//!
//! Views dereference to the raw structure, so fields read the same way as
//! in the ELF gABI (`ehdr.e_shstrndx`, `shdr.sh_addr`).

use crate::error::Result;
use crate::formats::elf::{
    RawArchiveHeader, RawFileHeader, RawSectionHeader, SHF_ALLOC, SHF_EXECINSTR, SHF_INFO_LINK,
    SHF_MERGE, SHF_STRINGS, SHF_TLS, SHF_WRITE, SHN_UNDEF,
};
use crate::graph::cache::{Attr, NodeKey, SectionId, Value};
use crate::graph::file::ElfFile;
use crate::graph::node::{Node, RawStruct};
use bitflags::bitflags;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

bitflags! {
    /// `sh_flags` bits understood by the graph
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionFlags: u64 {
        const WRITE = SHF_WRITE;
        const ALLOC = SHF_ALLOC;
        const EXECINSTR = SHF_EXECINSTR;
        const MERGE = SHF_MERGE;
        const STRINGS = SHF_STRINGS;
        const INFO_LINK = SHF_INFO_LINK;
        const TLS = SHF_TLS;
    }
}

/// The ELF file header.
#[derive(Clone, Copy)]
pub struct FileHeader<'f> {
    file: &'f ElfFile,
    raw: RawFileHeader,
}

impl<'f> FileHeader<'f> {
    pub(crate) fn new(file: &'f ElfFile, raw: RawFileHeader) -> Self {
        Self { file, raw }
    }

    pub fn raw(&self) -> &RawFileHeader {
        &self.raw
    }

    /// Section-name table index after the `SHN_XINDEX` escape
    pub fn shstrndx(&self) -> Result<usize> {
        self.file.shstrndx()
    }
}

impl Deref for FileHeader<'_> {
    type Target = RawFileHeader;

    fn deref(&self) -> &RawFileHeader {
        &self.raw
    }
}

impl fmt::Debug for FileHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.raw, f)
    }
}

impl Node for FileHeader<'_> {
    fn key(&self) -> NodeKey {
        NodeKey::FileHeader
    }

    fn attr_names(&self) -> &'static [&'static str] {
        &["shstrndx"]
    }

    fn resolve(&self, name: &str) -> Option<Result<Value>> {
        match name {
            "shstrndx" => Some(self.shstrndx().map(|i| Value::Section(SectionId(i)))),
            _ => None,
        }
    }

    fn raw_struct(&self) -> Result<Option<RawStruct>> {
        Ok(Some(RawStruct::FileHeader(self.raw)))
    }
}

/// A section header.
#[derive(Clone, Copy)]
pub struct SectionHeader<'f> {
    file: &'f ElfFile,
    section: usize,
    raw: RawSectionHeader,
}

impl<'f> SectionHeader<'f> {
    pub(crate) fn new(file: &'f ElfFile, section: usize, raw: RawSectionHeader) -> Self {
        Self { file, section, raw }
    }

    pub fn raw(&self) -> &RawSectionHeader {
        &self.raw
    }

    /// Index of the section this header describes
    pub fn section_index(&self) -> usize {
        self.section
    }

    /// Section name from the section-name string table.
    ///
    /// Empty when the file has no section-name table.
    pub fn name(&self) -> Result<Rc<str>> {
        let key = NodeKey::SectionHeader(SectionId(self.section));
        self.file.memo(key, Attr::Name, || {
            let shstrndx = self.file.shstrndx()?;
            if shstrndx == SHN_UNDEF as usize {
                return Ok(Rc::from(""));
            }
            let name = self.file.accessor()?.string(shstrndx, self.raw.sh_name)?;
            Ok(Rc::from(name))
        })
    }

    pub fn flags(&self) -> SectionFlags {
        SectionFlags::from_bits_truncate(self.raw.sh_flags)
    }
}

impl Deref for SectionHeader<'_> {
    type Target = RawSectionHeader;

    fn deref(&self) -> &RawSectionHeader {
        &self.raw
    }
}

impl fmt::Debug for SectionHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionHeader")
            .field("section", &self.section)
            .field("raw", &self.raw)
            .finish()
    }
}

impl Node for SectionHeader<'_> {
    fn key(&self) -> NodeKey {
        NodeKey::SectionHeader(SectionId(self.section))
    }

    fn attr_names(&self) -> &'static [&'static str] {
        &["name"]
    }

    fn resolve(&self, name: &str) -> Option<Result<Value>> {
        match name {
            "name" => Some(self.name().map(Value::Text)),
            _ => None,
        }
    }

    fn raw_struct(&self) -> Result<Option<RawStruct>> {
        Ok(Some(RawStruct::SectionHeader(self.raw)))
    }
}

/// Header of the archive member a file was read from.
#[derive(Clone, PartialEq, Eq)]
pub struct ArchiveMemberHeader {
    raw: RawArchiveHeader,
}

impl ArchiveMemberHeader {
    pub(crate) fn new(raw: RawArchiveHeader) -> Self {
        Self { raw }
    }

    /// Member name as recorded in the archive
    pub fn name(&self) -> &str {
        &self.raw.name
    }

    pub fn raw(&self) -> &RawArchiveHeader {
        &self.raw
    }
}

impl Deref for ArchiveMemberHeader {
    type Target = RawArchiveHeader;

    fn deref(&self) -> &RawArchiveHeader {
        &self.raw
    }
}

impl fmt::Debug for ArchiveMemberHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.raw, f)
    }
}

impl Node for ArchiveMemberHeader {
    fn key(&self) -> NodeKey {
        NodeKey::ArchiveHeader
    }

    fn attr_names(&self) -> &'static [&'static str] {
        &[]
    }

    fn resolve(&self, _name: &str) -> Option<Result<Value>> {
        None
    }

    fn raw_struct(&self) -> Result<Option<RawStruct>> {
        Ok(Some(RawStruct::ArchiveHeader(self.raw.clone())))
    }
}
