//! Lazily resolved object graph over ELF object files and `ar` archives.
//!
//! Open a file with [`ElfFile::open`] and walk sections, symbols and
//! relocations as typed handles; derived relationships are computed on
//! first access and cached for the lifetime of the open file.

/// Configuration structs
pub mod config;
/// Error types
pub mod error;
/// Raw ELF and archive accessors
pub mod formats;
/// The object graph
pub mod graph;
/// File mapping
pub mod io;
/// Tracing setup and macros
pub mod logging;

pub use config::GraphConfig;
pub use error::{ElfGraphError, Result};
pub use formats::elf::{ElfClass, RawAccessor};
pub use graph::{
    Archive, DataBlock, Deref, ElfFile, Node, RelocKind, Relocation, Section, Symbol,
    SymbolContents, Value,
};
