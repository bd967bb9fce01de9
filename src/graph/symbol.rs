//! Symbol nodes: names, defining sections and contents.

use crate::error::{ElfGraphError, Result};
use crate::formats::elf::{
    RawSymbol, SHN_LORESERVE, STB_GLOBAL, STB_GNU_UNIQUE, STB_LOCAL, STB_WEAK, STT_COMMON,
    STT_FILE, STT_FUNC, STT_GNU_IFUNC, STT_NOTYPE, STT_OBJECT, STT_SECTION, STT_TLS,
    STV_HIDDEN, STV_INTERNAL, STV_PROTECTED,
};
use crate::graph::cache::{Attr, ContentsIds, NodeKey, RelocId, SectionId, SymbolId, Value};
use crate::graph::file::ElfFile;
use crate::graph::node::{Node, RawStruct};
use crate::graph::relocation::Relocation;
use crate::graph::section::Section;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Symbol kinds (`STT_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    NoType,
    /// Data object symbol
    Object,
    /// Function symbol
    Function,
    /// Section symbol
    Section,
    /// Source file symbol
    File,
    /// Uninitialized common block
    Common,
    /// Thread-local storage object
    Tls,
    /// GNU indirect function
    IndirectFunction,
    Other(u8),
}

impl From<u8> for SymbolKind {
    fn from(st_type: u8) -> Self {
        match st_type {
            STT_NOTYPE => SymbolKind::NoType,
            STT_OBJECT => SymbolKind::Object,
            STT_FUNC => SymbolKind::Function,
            STT_SECTION => SymbolKind::Section,
            STT_FILE => SymbolKind::File,
            STT_COMMON => SymbolKind::Common,
            STT_TLS => SymbolKind::Tls,
            STT_GNU_IFUNC => SymbolKind::IndirectFunction,
            other => SymbolKind::Other(other),
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::NoType => write!(f, "NoType"),
            SymbolKind::Object => write!(f, "Object"),
            SymbolKind::Function => write!(f, "Function"),
            SymbolKind::Section => write!(f, "Section"),
            SymbolKind::File => write!(f, "File"),
            SymbolKind::Common => write!(f, "Common"),
            SymbolKind::Tls => write!(f, "Tls"),
            SymbolKind::IndirectFunction => write!(f, "IndirectFunction"),
            SymbolKind::Other(v) => write!(f, "Other({})", v),
        }
    }
}

/// Symbol binding types (`STB_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolBinding {
    /// Local symbol
    Local,
    /// Global symbol
    Global,
    /// Weak symbol
    Weak,
    /// GNU unique global
    Unique,
    Other(u8),
}

impl From<u8> for SymbolBinding {
    fn from(st_bind: u8) -> Self {
        match st_bind {
            STB_LOCAL => SymbolBinding::Local,
            STB_GLOBAL => SymbolBinding::Global,
            STB_WEAK => SymbolBinding::Weak,
            STB_GNU_UNIQUE => SymbolBinding::Unique,
            other => SymbolBinding::Other(other),
        }
    }
}

impl fmt::Display for SymbolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolBinding::Local => write!(f, "Local"),
            SymbolBinding::Global => write!(f, "Global"),
            SymbolBinding::Weak => write!(f, "Weak"),
            SymbolBinding::Unique => write!(f, "Unique"),
            SymbolBinding::Other(v) => write!(f, "Other({})", v),
        }
    }
}

/// Symbol visibility levels (`STV_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolVisibility {
    /// Default visibility
    Public,
    Internal,
    Protected,
    Hidden,
}

impl From<u8> for SymbolVisibility {
    fn from(st_visibility: u8) -> Self {
        match st_visibility {
            STV_INTERNAL => SymbolVisibility::Internal,
            STV_HIDDEN => SymbolVisibility::Hidden,
            STV_PROTECTED => SymbolVisibility::Protected,
            _ => SymbolVisibility::Public,
        }
    }
}

/// Bytes of a symbol plus the relocations that apply inside them.
#[derive(Debug, Clone)]
pub struct SymbolContents<'f> {
    pub bytes: Bytes,
    /// Always empty: `SHT_REL` relocations are not collected for symbols
    pub rels: Vec<Relocation<'f>>,
    pub relas: Vec<Relocation<'f>>,
}

/// An entry of a symbol table.
#[derive(Clone, Copy)]
pub struct Symbol<'f> {
    file: &'f ElfFile,
    id: SymbolId,
    raw: RawSymbol,
}

impl<'f> Symbol<'f> {
    pub(crate) fn new(file: &'f ElfFile, id: SymbolId, raw: RawSymbol) -> Self {
        Self { file, id, raw }
    }

    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn raw(&self) -> &RawSymbol {
        &self.raw
    }

    fn node(&self) -> NodeKey {
        NodeKey::Symbol(self.id)
    }

    /// The symbol table holding this entry
    pub fn section(&self) -> Section<'f> {
        Section::new(self.file, self.id.table)
    }

    /// Name from the symbol table's linked string table
    pub fn name(&self) -> Result<Rc<str>> {
        self.file.memo(self.node(), Attr::Name, || {
            let strtab = self.section().link_scn()?;
            let name = self
                .file
                .accessor()?
                .string(strtab.index(), self.raw.st_name)?;
            Ok(Rc::from(name))
        })
    }

    pub fn value(&self) -> u64 {
        self.raw.st_value
    }

    pub fn size(&self) -> u64 {
        self.raw.st_size
    }

    pub fn shndx(&self) -> u16 {
        self.raw.st_shndx
    }

    pub fn defined(&self) -> bool {
        !self.raw.is_undefined()
    }

    pub fn binding(&self) -> SymbolBinding {
        self.file.class().st_bind(self.raw.st_info).into()
    }

    pub fn kind(&self) -> SymbolKind {
        self.file.class().st_type(self.raw.st_info).into()
    }

    pub fn visibility(&self) -> SymbolVisibility {
        self.file.class().st_visibility(self.raw.st_other).into()
    }

    /// The section defining this symbol.
    ///
    /// `None` for undefined symbols and for reserved indices such as
    /// `SHN_ABS` and `SHN_COMMON`.
    pub fn target(&self) -> Result<Option<Section<'f>>> {
        let id = self.file.memo(self.node(), Attr::Target, || {
            let shndx = self.raw.st_shndx;
            if self.raw.is_undefined() || shndx >= SHN_LORESERVE {
                Ok(None)
            } else {
                Ok(Some(SectionId(shndx as usize)))
            }
        })?;
        id.map(|id| self.file.section(id.0)).transpose()
    }

    /// The `[st_value, st_value + st_size)` bytes of the defining section
    /// and the RELA relocations applying to them.
    pub fn contents(&self) -> Result<SymbolContents<'f>> {
        let ids = self.contents_ids()?;
        let relocs = |ids: &[RelocId]| {
            ids.iter()
                .map(|id| self.file.relocation(*id))
                .collect::<Result<Vec<_>>>()
        };
        Ok(SymbolContents {
            bytes: ids.bytes.clone(),
            rels: relocs(&ids.rels)?,
            relas: relocs(&ids.relas)?,
        })
    }

    /// `contents` as cached, with relocations kept as identities
    pub fn contents_ids(&self) -> Result<Rc<ContentsIds>> {
        self.file.memo(self.node(), Attr::Contents, || {
            if self.raw.is_undefined() {
                return Err(ElfGraphError::UnsupportedOperation(format!(
                    "undefined symbol `{}` has no contents",
                    self.name()?
                )));
            }
            let section = self.target()?.ok_or_else(|| {
                ElfGraphError::MissingRelationship(format!(
                    "symbol `{}` has reserved section index {:#x}",
                    self.name().map(|n| n.to_string()).unwrap_or_default(),
                    self.raw.st_shndx
                ))
            })?;

            let (start, size) = (self.raw.st_value, self.raw.st_size);
            Ok(Rc::new(ContentsIds {
                bytes: section.mem_in_range(start, size)?,
                rels: Vec::new(),
                relas: section
                    .relas_in_range(start, size)?
                    .iter()
                    .map(|r| r.id())
                    .collect(),
            }))
        })
    }
}

impl PartialEq for Symbol<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.file, other.file) && self.id == other.id
    }
}

impl Eq for Symbol<'_> {}

impl fmt::Debug for Symbol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("table", &self.id.table)
            .field("index", &self.id.index)
            .field("value", &self.raw.st_value)
            .field("size", &self.raw.st_size)
            .finish()
    }
}

impl Node for Symbol<'_> {
    fn key(&self) -> NodeKey {
        self.node()
    }

    fn attr_names(&self) -> &'static [&'static str] {
        &["name", "section", "defined", "target", "contents"]
    }

    fn resolve(&self, name: &str) -> Option<Result<Value>> {
        let resolved = match name {
            "name" => self.name().map(Value::Text),
            "section" => Ok(Value::Section(SectionId(self.id.table))),
            "defined" => Ok(Value::Bool(self.defined())),
            "target" => self
                .target()
                .map(|t| t.map_or(Value::None, |s| Value::Section(SectionId(s.index())))),
            "contents" => self.contents_ids().map(Value::Contents),
            _ => return None,
        };
        Some(resolved)
    }

    fn raw_struct(&self) -> Result<Option<RawStruct>> {
        Ok(Some(RawStruct::Symbol(self.raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::elf::{
        ElfClass, RawRelocation, SyntheticElf, SHN_ABS, SHT_RELA, SHT_SYMTAB, STV_DEFAULT,
    };

    fn sym_info(bind: u8, kind: u8) -> u8 {
        (bind << 4) | kind
    }

    fn fixture() -> ElfFile {
        let mut elf = SyntheticElf::new(ElfClass::Elf64);
        let data = elf.add_progbits(".data", 0, &(0u8..64).collect::<Vec<_>>());
        let strtab = elf.add_strtab(".strtab");
        let symtab = elf.add_symtab(".symtab", SHT_SYMTAB, strtab);
        elf.add_symbol(
            symtab,
            "table",
            RawSymbol {
                st_value: 8,
                st_size: 16,
                st_info: sym_info(STB_GLOBAL, STT_OBJECT),
                st_other: STV_HIDDEN,
                st_shndx: data as u16,
                ..Default::default()
            },
        );
        elf.add_symbol(
            symtab,
            "puts",
            RawSymbol {
                st_info: sym_info(STB_GLOBAL, STT_FUNC),
                ..Default::default()
            },
        );
        elf.add_symbol(
            symtab,
            "CONST",
            RawSymbol {
                st_value: 42,
                st_shndx: SHN_ABS,
                ..Default::default()
            },
        );
        let rela = elf.add_reloc_section(".rela.data", SHT_RELA, symtab, data);
        for offset in [4u64, 8, 16, 24] {
            elf.add_relocation(
                rela,
                RawRelocation {
                    r_offset: offset,
                    r_info: ElfClass::Elf64.r_info(2, 1),
                    r_addend: Some(0),
                },
            );
        }
        ElfFile::from_accessor(Box::new(elf), None).unwrap()
    }

    #[test]
    fn test_symbol_fields() {
        let file = fixture();
        let table = file.find_sym("table").unwrap();
        assert!(table.defined());
        assert_eq!(table.binding(), SymbolBinding::Global);
        assert_eq!(table.kind(), SymbolKind::Object);
        assert_eq!(table.visibility(), SymbolVisibility::Hidden);
        assert_eq!(&*table.target().unwrap().unwrap().name().unwrap(), ".data");
        assert_eq!(&*table.section().name().unwrap(), ".symtab");
    }

    #[test]
    fn test_contents() {
        let file = fixture();
        let contents = file.find_sym("table").unwrap().contents().unwrap();
        assert_eq!(&contents.bytes[..], &(8u8..24).collect::<Vec<_>>()[..]);
        let offsets: Vec<u64> = contents.relas.iter().map(|r| r.offset()).collect();
        assert_eq!(offsets, vec![8, 16]);
        assert!(contents.rels.is_empty());
    }

    #[test]
    fn test_contents_errors() {
        let file = fixture();
        let puts = file.find_sym("puts").unwrap();
        assert!(!puts.defined());
        assert!(puts.target().unwrap().is_none());
        assert!(matches!(
            puts.contents(),
            Err(ElfGraphError::UnsupportedOperation(_))
        ));

        let abs = file.find_sym("CONST").unwrap();
        assert!(abs.target().unwrap().is_none());
        assert!(matches!(
            abs.contents(),
            Err(ElfGraphError::MissingRelationship(_))
        ));
    }

    #[test]
    fn test_failed_resolution_not_cached() {
        let file = fixture();
        let puts = file.find_sym("puts").unwrap();
        assert!(puts.contents().is_err());
        assert!(!file.is_cached(puts.key(), Attr::Contents));

        let table = file.find_sym("table").unwrap();
        table.contents().unwrap();
        assert!(file.is_cached(table.key(), Attr::Contents));
    }

    #[test]
    fn test_raw_fallthrough() {
        let file = fixture();
        let table = file.find_sym("table").unwrap();
        assert_eq!(table.get("st_size").unwrap(), Value::Int(16));
        assert_eq!(table.get("defined").unwrap(), Value::Bool(true));
        assert!(matches!(
            table.get("sh_addr"),
            Err(ElfGraphError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_kind_from_raw() {
        assert_eq!(SymbolKind::from(STT_GNU_IFUNC), SymbolKind::IndirectFunction);
        assert_eq!(SymbolKind::from(13), SymbolKind::Other(13));
        assert_eq!(SymbolBinding::from(STB_GNU_UNIQUE), SymbolBinding::Unique);
        assert_eq!(SymbolVisibility::from(STV_DEFAULT), SymbolVisibility::Public);
    }
}
