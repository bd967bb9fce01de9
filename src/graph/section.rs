//! Section nodes and their relationships.

use crate::error::{ElfGraphError, Result};
use crate::formats::elf::{
    RawDataBlock, RawRelocation, RawSymbol, SHT_DYNAMIC, SHT_DYNSYM, SHT_GNU_HASH,
    SHT_GNU_VERNEED, SHT_GNU_VERSYM, SHT_HASH, SHT_REL, SHT_RELA, SHT_SYMTAB,
};
use crate::graph::cache::{Attr, NodeKey, RelocId, SectionId, SymbolId, Value};
use crate::graph::data::DataBlock;
use crate::graph::file::ElfFile;
use crate::graph::header::SectionHeader;
use crate::graph::node::{Node, RawStruct};
use crate::graph::range;
use crate::graph::relocation::Relocation;
use crate::graph::symbol::Symbol;
use bytes::Bytes;
use std::fmt;
use std::rc::Rc;

/// Section types whose `sh_link` names another section
const LINKED_TYPES: &[u32] = &[
    SHT_SYMTAB,
    SHT_DYNSYM,
    SHT_REL,
    SHT_RELA,
    SHT_DYNAMIC,
    SHT_HASH,
    SHT_GNU_HASH,
    SHT_GNU_VERSYM,
    SHT_GNU_VERNEED,
];

/// A section of an open file, identified by its index.
#[derive(Clone, Copy)]
pub struct Section<'f> {
    file: &'f ElfFile,
    index: usize,
}

impl<'f> Section<'f> {
    pub(crate) fn new(file: &'f ElfFile, index: usize) -> Self {
        Self { file, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn file(&self) -> &'f ElfFile {
        self.file
    }

    fn node(&self) -> NodeKey {
        NodeKey::Section(SectionId(self.index))
    }

    pub fn header(&self) -> Result<SectionHeader<'f>> {
        let raw = self.file.memo(self.node(), Attr::Header, || {
            self.file.raw_section_header(self.index)
        })?;
        Ok(SectionHeader::new(self.file, self.index, raw))
    }

    /// Alias of `header`
    pub fn shdr(&self) -> Result<SectionHeader<'f>> {
        self.header()
    }

    pub fn name(&self) -> Result<Rc<str>> {
        self.header()?.name()
    }

    fn describe(&self) -> String {
        match self.name() {
            Ok(name) if !name.is_empty() => format!("section {} ({})", self.index, name),
            _ => format!("section {}", self.index),
        }
    }

    /// The section named by `sh_link`: the string table of a symbol table,
    /// the symbol table of a relocation section, and so on.
    pub fn link_scn(&self) -> Result<Section<'f>> {
        let id = self.file.memo(self.node(), Attr::LinkScn, || {
            let header = self.header()?;
            if !LINKED_TYPES.contains(&header.sh_type) {
                return Err(ElfGraphError::MissingRelationship(format!(
                    "{} has no link section",
                    self.describe()
                )));
            }
            Ok(SectionId(header.sh_link as usize))
        })?;
        self.file.section(id.0)
    }

    /// The section a relocation section applies to (`sh_info`)
    pub fn info_scn(&self) -> Result<Section<'f>> {
        let id = self.file.memo(self.node(), Attr::InfoScn, || {
            let header = self.header()?;
            if !header.is_reloc() {
                return Err(ElfGraphError::MissingRelationship(format!(
                    "{} has no info section",
                    self.describe()
                )));
            }
            Ok(SectionId(header.sh_info as usize))
        })?;
        self.file.section(id.0)
    }

    pub(crate) fn symbol_entries(&self) -> Result<Rc<[RawSymbol]>> {
        self.file.memo_seq(self.node(), Attr::SymbolEntries, || {
            Ok(self.file.accessor()?.symbol_entries(self.index)?)
        })
    }

    pub(crate) fn relocation_entries(&self) -> Result<Rc<[RawRelocation]>> {
        self.file.memo_seq(self.node(), Attr::RelocEntries, || {
            Ok(self.file.accessor()?.relocation_entries(self.index)?)
        })
    }

    fn require_type(&self, sh_type: &[u32], what: &str) -> Result<()> {
        if sh_type.contains(&self.header()?.sh_type) {
            Ok(())
        } else {
            Err(ElfGraphError::UnsupportedOperation(format!(
                "{} does not contain {}",
                self.describe(),
                what
            )))
        }
    }

    /// Symbols of a `SHT_SYMTAB` or `SHT_DYNSYM` section, in table order
    pub fn syms(&self) -> Result<Vec<Symbol<'f>>> {
        self.require_type(&[SHT_SYMTAB, SHT_DYNSYM], "symbols")?;
        let entries = self.symbol_entries()?;
        Ok(entries
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let id = SymbolId {
                    table: self.index,
                    index,
                };
                Symbol::new(self.file, id, *raw)
            })
            .collect())
    }

    /// Symbol at `index` of this symbol table
    pub fn sym(&self, index: usize) -> Result<Symbol<'f>> {
        self.require_type(&[SHT_SYMTAB, SHT_DYNSYM], "symbols")?;
        let entries = self.symbol_entries()?;
        let raw = entries.get(index).ok_or_else(|| {
            ElfGraphError::MissingRelationship(format!(
                "{} has no symbol {}",
                self.describe(),
                index
            ))
        })?;
        let id = SymbolId {
            table: self.index,
            index,
        };
        Ok(Symbol::new(self.file, id, *raw))
    }

    /// Relocation at file-order `index` of this relocation section
    pub fn reloc(&self, index: usize) -> Result<Relocation<'f>> {
        self.require_type(&[SHT_REL, SHT_RELA], "relocations")?;
        let entries = self.relocation_entries()?;
        let raw = entries.get(index).ok_or_else(|| {
            ElfGraphError::MissingRelationship(format!(
                "{} has no relocation {}",
                self.describe(),
                index
            ))
        })?;
        let id = RelocId {
            table: self.index,
            index,
        };
        Ok(Relocation::new(self.file, id, *raw))
    }

    fn sorted_relocs(&self, sh_type: u32, attr: Attr, what: &str) -> Result<Vec<Relocation<'f>>> {
        self.require_type(&[sh_type], what)?;
        let entries = self.relocation_entries()?;
        let ids = self.file.memo(self.node(), attr, || {
            let mut ids: Vec<RelocId> = (0..entries.len())
                .map(|index| RelocId {
                    table: self.index,
                    index,
                })
                .collect();
            // Stable: equal offsets keep file order
            ids.sort_by_key(|id| entries[id.index].r_offset);
            Ok(Rc::<[RelocId]>::from(ids))
        })?;
        Ok(ids
            .iter()
            .map(|id| Relocation::new(self.file, *id, entries[id.index]))
            .collect())
    }

    /// `SHT_RELA` entries sorted by `r_offset`
    pub fn relas(&self) -> Result<Vec<Relocation<'f>>> {
        self.sorted_relocs(SHT_RELA, Attr::Relas, "RELA relocations")
    }

    /// `SHT_REL` entries sorted by `r_offset`
    pub fn rels(&self) -> Result<Vec<Relocation<'f>>> {
        self.sorted_relocs(SHT_REL, Attr::Rels, "REL relocations")
    }

    fn reloc_scns(&self, sh_type: u32, attr: Attr) -> Result<Vec<Section<'f>>> {
        let ids = self.file.memo_seq(self.node(), attr, || {
            let mut ids = Vec::new();
            for section in self.file.sections()? {
                let header = section.header()?;
                if header.sh_type == sh_type && header.sh_info as usize == self.index {
                    ids.push(SectionId(section.index));
                }
            }
            Ok(ids)
        })?;
        ids.iter().map(|id| self.file.section(id.0)).collect()
    }

    /// `SHT_RELA` sections whose `sh_info` names this section
    pub fn rela_scns(&self) -> Result<Vec<Section<'f>>> {
        self.reloc_scns(SHT_RELA, Attr::RelaScns)
    }

    /// `SHT_REL` sections whose `sh_info` names this section
    pub fn rel_scns(&self) -> Result<Vec<Section<'f>>> {
        self.reloc_scns(SHT_REL, Attr::RelScns)
    }

    pub(crate) fn blocks(&self) -> Result<Rc<[RawDataBlock]>> {
        self.file.memo_seq(self.node(), Attr::Data, || {
            Ok(self.file.accessor()?.section_data(self.index)?)
        })
    }

    /// Data blocks in accessor order
    pub fn data(&self) -> Result<Vec<DataBlock<'f>>> {
        let blocks = self.blocks()?;
        Ok(blocks
            .iter()
            .enumerate()
            .map(|(ordinal, raw)| DataBlock::new(self.file, self.index, ordinal, raw.clone()))
            .collect())
    }

    /// Bytes covering `[start, start + size)`, with addresses relative to
    /// `sh_addr`
    pub fn mem_in_range(&self, start: u64, size: u64) -> Result<Bytes> {
        let base = self.header()?.sh_addr;
        let blocks = self.blocks()?;
        Ok(Bytes::from(range::mem_in_range(&blocks, base, start, size)))
    }

    /// NUL-terminated string at address `ptr`, or `None` if the section
    /// holds no byte at `ptr`
    pub fn str_at_addr(&self, ptr: u64) -> Result<Option<String>> {
        let base = self.header()?.sh_addr;
        let blocks = self.blocks()?;
        Ok(range::str_at_addr(&blocks, base, ptr)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// `SHT_RELA` relocations applying to this section inside
    /// `[start, start + size)`, across all its RELA sections
    pub fn relas_in_range(&self, start: u64, size: u64) -> Result<Vec<Relocation<'f>>> {
        let mut out = Vec::new();
        for scn in self.rela_scns()? {
            let relas = scn.relas()?;
            out.extend_from_slice(range::in_sorted_range(&relas, start, size));
        }
        Ok(out)
    }

    /// `SHT_REL` counterpart of `relas_in_range`
    pub fn rels_in_range(&self, start: u64, size: u64) -> Result<Vec<Relocation<'f>>> {
        let mut out = Vec::new();
        for scn in self.rel_scns()? {
            let rels = scn.rels()?;
            out.extend_from_slice(range::in_sorted_range(&rels, start, size));
        }
        Ok(out)
    }
}

impl PartialEq for Section<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.file, other.file) && self.index == other.index
    }
}

impl Eq for Section<'_> {}

impl fmt::Debug for Section<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Section({})", self.index)
    }
}

impl Node for Section<'_> {
    fn key(&self) -> NodeKey {
        self.node()
    }

    fn attr_names(&self) -> &'static [&'static str] {
        &[
            "index",
            "header",
            "name",
            "link_scn",
            "info_scn",
            "syms",
            "relas",
            "rels",
            "rela_scns",
            "rel_scns",
            "data",
        ]
    }

    fn resolve(&self, name: &str) -> Option<Result<Value>> {
        fn sections(list: Result<Vec<Section<'_>>>) -> Result<Value> {
            list.map(|l| Value::Sections(l.iter().map(|s| SectionId(s.index)).collect()))
        }
        fn relocs(list: Result<Vec<Relocation<'_>>>) -> Result<Value> {
            list.map(|l| Value::Relocations(l.iter().map(|r| r.id()).collect()))
        }

        let resolved = match name {
            "index" => Ok(Value::Int(self.index as u64)),
            "header" => self.header().map(|h| Value::SectionHeader(*h.raw())),
            "name" => self.name().map(Value::Text),
            "link_scn" => self.link_scn().map(|s| Value::Section(SectionId(s.index))),
            "info_scn" => self.info_scn().map(|s| Value::Section(SectionId(s.index))),
            "syms" => self
                .syms()
                .map(|l| Value::Symbols(l.iter().map(|s| s.id()).collect())),
            "relas" => relocs(self.relas()),
            "rels" => relocs(self.rels()),
            "rela_scns" => sections(self.rela_scns()),
            "rel_scns" => sections(self.rel_scns()),
            "data" => self.blocks().map(Value::Blocks),
            _ => return None,
        };
        Some(resolved)
    }

    fn raw_struct(&self) -> Result<Option<RawStruct>> {
        Ok(None)
    }
}
