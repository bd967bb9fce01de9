//! Lazily resolved object graph over ELF files.
//!
//! `ElfFile` is the root. Sections, symbols, relocations, data blocks and
//! headers are lightweight handles that borrow the file; every derived
//! attribute is resolved on first access and memoized in the file's cache.

pub mod archive;
pub mod cache;
pub mod data;
pub mod file;
pub mod header;
pub mod node;
pub mod range;
pub mod relocation;
pub mod section;
pub mod symbol;

pub use archive::{Archive, ArchiveMembers};
pub use cache::{ContentsIds, NodeKey, RelocId, SectionId, SymbolId, Value};
pub use data::DataBlock;
pub use file::{Deref, ElfFile};
pub use header::{ArchiveMemberHeader, FileHeader, SectionFlags, SectionHeader};
pub use node::{FieldProjection, Node, RawStruct};
pub use relocation::{RelocKind, Relocation};
pub use section::Section;
pub use symbol::{Symbol, SymbolBinding, SymbolContents, SymbolKind, SymbolVisibility};
