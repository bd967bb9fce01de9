//! Per-file attribute cache.
//!
//! Every derived attribute of every node is computed at most once per open
//! file. Entries are keyed by the node's structural identity plus the
//! attribute, so two handles to the same section share one cache slot.
//! Failed computations are never stored.

use crate::formats::elf::{
    RawArchiveHeader, RawDataBlock, RawFileHeader, RawRelocation, RawSectionHeader, RawSymbol,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Index of a section in the file's section table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub usize);

/// A symbol: the owning symbol table plus the entry index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId {
    pub table: usize,
    pub index: usize,
}

/// A relocation: the owning relocation section plus the entry index in
/// file order (not in sorted order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelocId {
    pub table: usize,
    pub index: usize,
}

/// Structural identity of a node within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    File,
    FileHeader,
    ArchiveHeader,
    Section(SectionId),
    SectionHeader(SectionId),
    DataBlock { section: usize, ordinal: usize },
    Symbol(SymbolId),
    Relocation(RelocId),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::File => write!(f, "ElfFile"),
            NodeKey::FileHeader => write!(f, "FileHeader"),
            NodeKey::ArchiveHeader => write!(f, "ArchiveMemberHeader"),
            NodeKey::Section(id) => write!(f, "Section({})", id.0),
            NodeKey::SectionHeader(id) => write!(f, "SectionHeader({})", id.0),
            NodeKey::DataBlock { section, ordinal } => {
                write!(f, "DataBlock({}:{})", section, ordinal)
            }
            NodeKey::Symbol(id) => write!(f, "Symbol({}:{})", id.table, id.index),
            NodeKey::Relocation(id) => write!(f, "Relocation({}:{})", id.table, id.index),
        }
    }
}

/// Derived attributes that are memoized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    Header,
    ArchiveHeader,
    Shstrndx,
    Sections,
    Syms,
    Name,
    LinkScn,
    InfoScn,
    SymbolEntries,
    RelocEntries,
    Relas,
    Rels,
    RelaScns,
    RelScns,
    Data,
    Target,
    Contents,
    Sym,
}

/// Resolved bytes and relocations of a symbol, stored by identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentsIds {
    pub bytes: Bytes,
    pub rels: Vec<RelocId>,
    pub relas: Vec<RelocId>,
}

/// A cached attribute value, also the result of dynamic `Node::get`.
///
/// Node-valued attributes are stored as identities; typed accessors turn
/// them back into handles.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(u64),
    Signed(i64),
    Text(Rc<str>),
    Bytes(Bytes),
    Section(SectionId),
    Sections(Rc<[SectionId]>),
    Symbol(SymbolId),
    Symbols(Rc<[SymbolId]>),
    Relocations(Rc<[RelocId]>),
    Blocks(Rc<[RawDataBlock]>),
    SymbolEntries(Rc<[RawSymbol]>),
    RelocEntries(Rc<[RawRelocation]>),
    FileHeader(RawFileHeader),
    SectionHeader(RawSectionHeader),
    ArchiveHeader(RawArchiveHeader),
    Contents(Rc<ContentsIds>),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Signed(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

/// Conversion between typed attribute results and cache entries.
pub trait Cached: Sized {
    fn into_value(self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! cached {
    ($ty:ty, $variant:ident) => {
        impl Cached for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

cached!(bool, Bool);
cached!(u64, Int);
cached!(Rc<str>, Text);
cached!(Bytes, Bytes);
cached!(SectionId, Section);
cached!(Rc<[SectionId]>, Sections);
cached!(SymbolId, Symbol);
cached!(Rc<[SymbolId]>, Symbols);
cached!(Rc<[RelocId]>, Relocations);
cached!(Rc<[RawDataBlock]>, Blocks);
cached!(Rc<[RawSymbol]>, SymbolEntries);
cached!(Rc<[RawRelocation]>, RelocEntries);
cached!(RawFileHeader, FileHeader);
cached!(RawSectionHeader, SectionHeader);
cached!(RawArchiveHeader, ArchiveHeader);
cached!(Rc<ContentsIds>, Contents);

impl<T: Cached> Cached for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::None => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Map from (node, attribute) to resolved value.
#[derive(Debug, Default)]
pub struct AttrCache {
    entries: HashMap<(NodeKey, Attr), Value>,
    stats: CacheStats,
}

impl AttrCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&mut self, node: NodeKey, attr: Attr) -> Option<Value> {
        match self.entries.get(&(node, attr)) {
            Some(value) => {
                self.stats.hits += 1;
                Some(value.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, node: NodeKey, attr: Attr, value: Value) {
        self.entries.insert((node, attr), value);
    }

    pub fn contains(&self, node: NodeKey, attr: Attr) -> bool {
        self.entries.contains_key(&(node, attr))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
