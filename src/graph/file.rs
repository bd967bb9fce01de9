//! The root of the object graph: one open ELF file.

use crate::config::GraphConfig;
use crate::error::{ElfGraphError, Result};
use crate::formats::elf::{
    is_archive, ElfClass, ElfImage, RawAccessor, RawSectionHeader, SHF_ALLOC, SHN_XINDEX,
    SHT_DYNSYM, SHT_NULL, SHT_SYMTAB,
};
use crate::graph::cache::{
    Attr, AttrCache, CacheStats, Cached, NodeKey, RelocId, SectionId, SymbolId, Value,
};
use crate::graph::header::{ArchiveMemberHeader, FileHeader};
use crate::graph::node::{Node, RawStruct};
use crate::graph::range;
use crate::graph::relocation::Relocation;
use crate::graph::section::Section;
use crate::graph::symbol::Symbol;
use crate::io::MappedFile;
use crate::{log_error, span_trace};
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Result of dereferencing an address range.
#[derive(Debug, Clone)]
pub struct Deref<'f> {
    /// The one section backing the range
    pub section: Section<'f>,
    /// Bytes of the range that the section holds
    pub bytes: Bytes,
    /// Always empty; see `Symbol::contents`
    pub rels: Vec<Relocation<'f>>,
    /// `SHT_RELA` relocations applying inside the range
    pub relas: Vec<Relocation<'f>>,
}

/// An open ELF file.
///
/// Nodes borrow the file, so the borrow checker guarantees no node
/// outlives it and `close` cannot run while nodes are alive.
pub struct ElfFile {
    path: Option<PathBuf>,
    accessor: Option<Box<dyn RawAccessor>>,
    class: ElfClass,
    config: GraphConfig,
    section_count: usize,
    sections: BTreeSet<usize>,
    symbols_by_name: HashMap<String, SymbolId>,
    cache: RefCell<AttrCache>,
}

impl fmt::Debug for ElfFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElfFile")
            .field("path", &self.path)
            .field("class", &self.class)
            .field("sections", &self.sections.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ElfFile {
    /// Open and map an ELF file with the default configuration
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &GraphConfig::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, config: &GraphConfig) -> Result<Self> {
        let path = path.as_ref();
        let _span = span_trace!("open_elf", path = %path.display()).entered();

        let mapped = MappedFile::open(path, &config.io)?;
        let bytes = mapped.bytes();
        if is_archive(&bytes) {
            return Err(log_error!(ElfGraphError::InvalidInput(format!(
                "{} is an archive; open it with Archive",
                path.display()
            ))));
        }

        let image = ElfImage::parse(bytes)?;
        let mut file = Self::with_config(Box::new(image), config)?;
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// Build a graph over any accessor, optionally forcing the file class
    pub fn from_accessor(
        accessor: Box<dyn RawAccessor>,
        class_override: Option<ElfClass>,
    ) -> Result<Self> {
        let config = GraphConfig {
            class_override,
            ..GraphConfig::default()
        };
        Self::with_config(accessor, &config)
    }

    pub fn with_config(accessor: Box<dyn RawAccessor>, config: &GraphConfig) -> Result<Self> {
        let class = config.class_override.unwrap_or_else(|| accessor.class());
        let section_count = accessor.section_count();

        // Index 0 is always present so that a zero link/info never fails
        let mut sections: BTreeSet<usize> = (0..section_count).collect();
        sections.insert(0);

        let mut file = Self {
            path: None,
            accessor: Some(accessor),
            class,
            config: config.clone(),
            section_count,
            sections,
            symbols_by_name: HashMap::new(),
            cache: RefCell::new(AttrCache::new()),
        };
        file.symbols_by_name = file.build_symbol_index()?;

        debug!(
            class = %class,
            sections = file.sections.len(),
            symbols = file.symbols_by_name.len(),
            "Opened ELF graph"
        );
        Ok(file)
    }

    fn build_symbol_index(&self) -> Result<HashMap<String, SymbolId>> {
        let mut index = HashMap::new();
        for section in self.sections()? {
            let sh_type = section.header()?.sh_type;
            let indexed = sh_type == SHT_SYMTAB
                || (sh_type == SHT_DYNSYM && self.config.symbols.include_dynamic);
            if !indexed {
                continue;
            }
            for sym in section.syms()? {
                let name = sym.name()?;
                if !name.is_empty() {
                    // Later definitions shadow earlier ones
                    index.insert(name.to_string(), sym.id());
                }
            }
        }
        Ok(index)
    }

    pub fn class(&self) -> ElfClass {
        self.class
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.accessor.is_none()
    }

    pub(crate) fn accessor(&self) -> Result<&dyn RawAccessor> {
        self.accessor.as_deref().ok_or(ElfGraphError::Closed)
    }

    /// Return the cached value of `attr` for `node`, computing it first if
    /// needed. Errors from `resolve` are returned and not cached.
    pub(crate) fn memo<T, F>(&self, node: NodeKey, attr: Attr, resolve: F) -> Result<T>
    where
        T: Cached + Clone,
        F: FnOnce() -> Result<T>,
    {
        let cached = self.cache.borrow_mut().lookup(node, attr);
        if let Some(value) = cached.as_ref().and_then(T::from_value) {
            trace!(node = %node, attr = ?attr, "Cache hit");
            return Ok(value);
        }

        let _span = span_trace!("resolve", node = %node, attr = ?attr).entered();
        let value = resolve()?;
        self.cache
            .borrow_mut()
            .insert(node, attr, value.clone().into_value());
        Ok(value)
    }

    /// `memo` for sequence attributes: the iterator is materialized once.
    pub(crate) fn memo_seq<T, I, F>(&self, node: NodeKey, attr: Attr, resolve: F) -> Result<Rc<[T]>>
    where
        Rc<[T]>: Cached,
        I: IntoIterator<Item = T>,
        F: FnOnce() -> Result<I>,
    {
        self.memo(node, attr, || Ok(resolve()?.into_iter().collect()))
    }

    /// Number of cached attribute values
    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub(crate) fn is_cached(&self, node: NodeKey, attr: Attr) -> bool {
        self.cache.borrow().contains(node, attr)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }

    pub(crate) fn raw_section_header(&self, index: usize) -> Result<RawSectionHeader> {
        if index >= self.section_count {
            // The reserved placeholder for a file without a section table
            return Ok(RawSectionHeader::default());
        }
        Ok(self.accessor()?.section_header(index)?)
    }

    /// The file header
    pub fn ehdr(&self) -> Result<FileHeader<'_>> {
        let raw = self.memo(NodeKey::File, Attr::Header, || {
            Ok(self.accessor()?.file_header()?)
        })?;
        Ok(FileHeader::new(self, raw))
    }

    /// Index of the section-name string table.
    ///
    /// Follows the `SHN_XINDEX` escape into section 0's `sh_link`.
    pub fn shstrndx(&self) -> Result<usize> {
        let id = self.memo(NodeKey::File, Attr::Shstrndx, || {
            let e_shstrndx = self.ehdr()?.e_shstrndx;
            let index = if e_shstrndx == SHN_XINDEX {
                self.raw_section_header(0)?.sh_link as usize
            } else {
                e_shstrndx as usize
            };
            Ok(SectionId(index))
        })?;
        Ok(id.0)
    }

    /// The archive member header, for files opened from an archive
    pub fn arhdr(&self) -> Result<ArchiveMemberHeader> {
        let raw = self.memo(NodeKey::File, Attr::ArchiveHeader, || {
            self.accessor()?.archive_header().ok_or_else(|| {
                ElfGraphError::UnsupportedOperation("file is not an archive member".to_string())
            })
        })?;
        Ok(ArchiveMemberHeader::new(raw))
    }

    /// All sections in index order, including the null section 0
    pub fn sections(&self) -> Result<Vec<Section<'_>>> {
        self.accessor()?;
        Ok(self
            .sections
            .iter()
            .map(|&index| Section::new(self, index))
            .collect())
    }

    pub fn section(&self, index: usize) -> Result<Section<'_>> {
        self.accessor()?;
        if self.sections.contains(&index) {
            Ok(Section::new(self, index))
        } else {
            Err(ElfGraphError::MissingRelationship(format!(
                "no section with index {}",
                index
            )))
        }
    }

    /// First section with the given name
    pub fn section_by_name(&self, name: &str) -> Result<Option<Section<'_>>> {
        for section in self.sections()? {
            if &*section.name()? == name {
                return Ok(Some(section));
            }
        }
        Ok(None)
    }

    /// Every symbol of every `SHT_SYMTAB` section, in table order
    pub fn syms(&self) -> Result<Vec<Symbol<'_>>> {
        let mut syms = Vec::new();
        for section in self.sections()? {
            if section.header()?.sh_type == SHT_SYMTAB {
                syms.extend(section.syms()?);
            }
        }
        Ok(syms)
    }

    /// Look up a symbol by exact name.
    ///
    /// When several symbols share a name the last one indexed wins.
    pub fn find_sym(&self, name: &str) -> Option<Symbol<'_>> {
        let id = *self.symbols_by_name.get(name)?;
        match self.symbol(id) {
            Ok(sym) => Some(sym),
            Err(err) => {
                warn!(name, error = %err, "Indexed symbol no longer resolves");
                None
            }
        }
    }

    /// Handle for a symbol identity
    pub fn symbol(&self, id: SymbolId) -> Result<Symbol<'_>> {
        self.section(id.table)?.sym(id.index)
    }

    /// Handle for a relocation identity
    pub fn relocation(&self, id: RelocId) -> Result<Relocation<'_>> {
        self.section(id.table)?.reloc(id.index)
    }

    /// The section backing the range `[addr, addr + size)` with its bytes
    /// and relocations.
    ///
    /// Returns `None` when no section overlaps the range and
    /// `OverlapViolation` when several do. A zero `size` asks for the
    /// section containing `addr`.
    pub fn deref(&self, addr: u64, size: u64) -> Result<Option<Deref<'_>>> {
        let _span = span_trace!("deref", addr = addr, size = size).entered();

        let mut hits = Vec::new();
        for section in self.sections()? {
            let header = section.header()?;
            if header.sh_type == SHT_NULL {
                continue;
            }
            if self.config.deref.alloc_only && header.sh_flags & SHF_ALLOC == 0 {
                continue;
            }
            if !range::overlaps(header.sh_addr, header.sh_size, addr, size) {
                continue;
            }
            if self.config.deref.is_excluded(&header.name()?) {
                continue;
            }
            hits.push(section);
        }

        match hits.as_slice() {
            [] => Ok(None),
            [section] => Ok(Some(Deref {
                section: *section,
                bytes: section.mem_in_range(addr, size)?,
                rels: Vec::new(),
                relas: section.relas_in_range(addr, size)?,
            })),
            _ => {
                let sections = hits
                    .iter()
                    .map(|s| s.name().map(|n| n.to_string()))
                    .collect::<Result<Vec<_>>>()?;
                Err(log_error!(ElfGraphError::OverlapViolation {
                    start: addr,
                    end: range::range_end(addr, size),
                    sections,
                }))
            }
        }
    }

    /// The section containing `addr`, if exactly one does
    pub fn section_at(&self, addr: u64) -> Result<Option<Section<'_>>> {
        Ok(self.deref(addr, 0)?.map(|d| d.section))
    }

    /// NUL-terminated string at a virtual address
    pub fn str_at_addr(&self, addr: u64) -> Result<Option<String>> {
        match self.section_at(addr)? {
            Some(section) => section.str_at_addr(addr),
            None => Ok(None),
        }
    }

    /// Release the underlying handle and drop all cached values.
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut accessor) = self.accessor.take() else {
            return Ok(());
        };
        self.cache.get_mut().clear();
        self.symbols_by_name.clear();
        accessor
            .close()
            .map_err(|e| log_error!(ElfGraphError::Teardown(e.to_string())))?;
        debug!(path = ?self.path, "Closed ELF graph");
        Ok(())
    }
}

impl Drop for ElfFile {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "Failed to close ELF file on drop");
        }
    }
}

impl Node for ElfFile {
    fn key(&self) -> NodeKey {
        NodeKey::File
    }

    fn attr_names(&self) -> &'static [&'static str] {
        &["shstrndx", "sections", "syms", "class"]
    }

    fn resolve(&self, name: &str) -> Option<Result<Value>> {
        let resolved = match name {
            "shstrndx" => self.shstrndx().map(|i| Value::Section(SectionId(i))),
            "sections" => self.sections().map(|s| {
                Value::Sections(s.iter().map(|s| SectionId(s.index())).collect())
            }),
            "syms" => self
                .syms()
                .map(|s| Value::Symbols(s.iter().map(|s| s.id()).collect())),
            "class" => Ok(Value::Int(self.class.bits() as u64)),
            _ => return None,
        };
        Some(resolved)
    }

    fn raw_struct(&self) -> Result<Option<RawStruct>> {
        Ok(None)
    }
}
