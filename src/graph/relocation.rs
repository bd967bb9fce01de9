//! Relocation nodes.

use crate::error::Result;
use crate::formats::elf::RawRelocation;
use crate::graph::cache::{Attr, NodeKey, RelocId, SectionId, Value};
use crate::graph::file::ElfFile;
use crate::graph::node::{Node, RawStruct};
use crate::graph::section::Section;
use crate::graph::symbol::Symbol;
use std::cmp::Ordering;
use std::fmt;

/// Entry layout of a relocation section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocKind {
    /// `SHT_REL`: the addend is stored at the relocated location
    Rel,
    /// `SHT_RELA`: explicit addend
    Rela,
}

/// An entry of a `SHT_REL` or `SHT_RELA` section.
///
/// Compares against a bare `u64` by `r_offset`, which is what the range
/// queries binary-search on.
#[derive(Clone, Copy)]
pub struct Relocation<'f> {
    file: &'f ElfFile,
    id: RelocId,
    raw: RawRelocation,
}

impl<'f> Relocation<'f> {
    pub(crate) fn new(file: &'f ElfFile, id: RelocId, raw: RawRelocation) -> Self {
        Self { file, id, raw }
    }

    pub fn id(&self) -> RelocId {
        self.id
    }

    pub fn raw(&self) -> &RawRelocation {
        &self.raw
    }

    fn node(&self) -> NodeKey {
        NodeKey::Relocation(self.id)
    }

    pub fn kind(&self) -> RelocKind {
        if self.raw.r_addend.is_some() {
            RelocKind::Rela
        } else {
            RelocKind::Rel
        }
    }

    pub fn offset(&self) -> u64 {
        self.raw.r_offset
    }

    pub fn info(&self) -> u64 {
        self.raw.r_info
    }

    pub fn addend(&self) -> Option<i64> {
        self.raw.r_addend
    }

    /// Symbol index from `r_info`, decoded for the file's class
    pub fn sym_index(&self) -> u32 {
        self.file.class().r_sym(self.raw.r_info)
    }

    /// Relocation type from `r_info`, decoded for the file's class
    pub fn reloc_type(&self) -> u32 {
        self.file.class().r_type(self.raw.r_info)
    }

    /// The relocation section holding this entry
    pub fn section(&self) -> Section<'f> {
        Section::new(self.file, self.id.table)
    }

    /// The section being relocated
    pub fn target(&self) -> Result<Section<'f>> {
        self.section().info_scn()
    }

    /// The referenced symbol, looked up in the section's linked symbol table
    pub fn sym(&self) -> Result<Symbol<'f>> {
        let id = self.file.memo(self.node(), Attr::Sym, || {
            let symtab = self.section().link_scn()?;
            Ok(symtab.sym(self.sym_index() as usize)?.id())
        })?;
        self.file.symbol(id)
    }
}

impl PartialEq for Relocation<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.file, other.file) && self.id == other.id
    }
}

impl Eq for Relocation<'_> {}

impl PartialEq<u64> for Relocation<'_> {
    fn eq(&self, offset: &u64) -> bool {
        self.raw.r_offset == *offset
    }
}

impl PartialOrd<u64> for Relocation<'_> {
    fn partial_cmp(&self, offset: &u64) -> Option<Ordering> {
        self.raw.r_offset.partial_cmp(offset)
    }
}

impl fmt::Debug for Relocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relocation")
            .field("table", &self.id.table)
            .field("index", &self.id.index)
            .field("offset", &self.raw.r_offset)
            .field("info", &self.raw.r_info)
            .field("addend", &self.raw.r_addend)
            .finish()
    }
}

impl Node for Relocation<'_> {
    fn key(&self) -> NodeKey {
        self.node()
    }

    fn attr_names(&self) -> &'static [&'static str] {
        &["sym", "section", "target", "sym_index", "reloc_type"]
    }

    fn resolve(&self, name: &str) -> Option<Result<Value>> {
        let resolved = match name {
            "sym" => self.sym().map(|s| Value::Symbol(s.id())),
            "section" => Ok(Value::Section(SectionId(self.id.table))),
            "target" => self.target().map(|s| Value::Section(SectionId(s.index()))),
            "sym_index" => Ok(Value::Int(self.sym_index() as u64)),
            "reloc_type" => Ok(Value::Int(self.reloc_type() as u64)),
            _ => return None,
        };
        Some(resolved)
    }

    fn raw_struct(&self) -> Result<Option<RawStruct>> {
        Ok(Some(RawStruct::Relocation(self.raw)))
    }
}
