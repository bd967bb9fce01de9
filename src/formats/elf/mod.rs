//! ELF accessor layer
//!
//! The object graph never decodes bytes itself. It consumes the primitive
//! operations of [`RawAccessor`]: file and section headers, section data
//! blocks, string lookups, symbol and relocation entries, and archive member
//! headers. Two accessors ship with the crate: [`ElfImage`], a zero-copy
//! parser over a mapped file, and [`SyntheticElf`], an in-memory builder.

pub mod archive;
pub mod entries;
pub mod headers;
pub mod image;
pub mod synthetic;
pub mod types;
pub mod utils;

pub use archive::ArchiveReader;
pub use image::ElfImage;
pub use synthetic::SyntheticElf;
pub use types::*;

/// Primitive, index-based access to one ELF file.
///
/// Implementations return values already widened to 64-bit fields; the
/// class-dependent interpretation of packed fields (`st_info`, `r_info`) is
/// left to the caller through [`ElfClass`].
pub trait RawAccessor {
    /// Probe the file class
    fn class(&self) -> ElfClass;

    fn file_header(&self) -> Result<RawFileHeader>;

    /// Number of entries in the section header table
    fn section_count(&self) -> usize;

    fn section_header(&self, index: usize) -> Result<RawSectionHeader>;

    /// The data blocks backing a section, in section order
    fn section_data(&self, index: usize) -> Result<Vec<RawDataBlock>>;

    /// Null-terminated string at `offset` in string table section `strtab`
    fn string(&self, strtab: usize, offset: u32) -> Result<String>;

    /// All entries of a symbol table section, including the null symbol
    fn symbol_entries(&self, index: usize) -> Result<Vec<RawSymbol>>;

    /// All entries of a `SHT_REL`/`SHT_RELA` section, in file order
    fn relocation_entries(&self, index: usize) -> Result<Vec<RawRelocation>>;

    /// Member header when this file was read out of an archive
    fn archive_header(&self) -> Option<RawArchiveHeader>;

    /// Release the underlying handle. Must be idempotent.
    fn close(&mut self) -> Result<()>;
}
