//! Data block nodes: one contiguous run of a section's bytes.

use crate::error::Result;
use crate::formats::elf::RawDataBlock;
use crate::graph::cache::{NodeKey, SectionId, Value};
use crate::graph::file::ElfFile;
use crate::graph::node::{Node, RawStruct};
use crate::graph::section::Section;
use bytes::Bytes;
use std::fmt;

#[derive(Clone)]
pub struct DataBlock<'f> {
    file: &'f ElfFile,
    section: usize,
    ordinal: usize,
    raw: RawDataBlock,
}

impl<'f> DataBlock<'f> {
    pub(crate) fn new(file: &'f ElfFile, section: usize, ordinal: usize, raw: RawDataBlock) -> Self {
        Self {
            file,
            section,
            ordinal,
            raw,
        }
    }

    pub fn section(&self) -> Section<'f> {
        Section::new(self.file, self.section)
    }

    /// Position in the section's block list
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Offset from the start of the section
    pub fn offset(&self) -> u64 {
        self.raw.offset
    }

    pub fn size(&self) -> u64 {
        self.raw.size()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.raw.bytes
    }

    /// Address of the first byte: `sh_addr + offset`
    pub fn addr(&self) -> Result<u64> {
        Ok(self.section().header()?.sh_addr.wrapping_add(self.raw.offset))
    }
}

impl fmt::Debug for DataBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBlock")
            .field("section", &self.section)
            .field("ordinal", &self.ordinal)
            .field("offset", &self.raw.offset)
            .field("size", &self.raw.size())
            .finish()
    }
}

impl Node for DataBlock<'_> {
    fn key(&self) -> NodeKey {
        NodeKey::DataBlock {
            section: self.section,
            ordinal: self.ordinal,
        }
    }

    fn attr_names(&self) -> &'static [&'static str] {
        &["section", "addr"]
    }

    fn resolve(&self, name: &str) -> Option<Result<Value>> {
        match name {
            "section" => Some(Ok(Value::Section(SectionId(self.section)))),
            "addr" => Some(self.addr().map(Value::Int)),
            _ => None,
        }
    }

    fn raw_struct(&self) -> Result<Option<RawStruct>> {
        Ok(Some(RawStruct::DataBlock(self.raw.clone())))
    }
}
