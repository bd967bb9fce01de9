//! Raw ELF types and constants exchanged with the accessor layer

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failures reported by an accessor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElfError {
    #[error("not an ELF image (bad magic)")]
    InvalidMagic,

    #[error("EI_CLASS {0} is neither ELFCLASS32 nor ELFCLASS64")]
    UnsupportedClass(u8),

    #[error("EI_DATA {0} is not a known byte order")]
    UnsupportedData(u8),

    #[error("offset {offset:#x} lies outside the image")]
    InvalidOffset { offset: usize },

    #[error("image ends before {needed} bytes at {offset:#x}")]
    Truncated { offset: usize, needed: usize },

    #[error("no section with index {0}")]
    InvalidSectionIndex(usize),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("accessor is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ElfError>;

/// ELF magic number
pub const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// `ar` archive magic
pub const AR_MAGIC: &[u8; 8] = b"!<arch>\n";

/// GNU thin archive magic
pub const AR_THIN_MAGIC: &[u8; 8] = b"!<thin>\n";

/// Whether `data` starts like an `ar` archive, regular or thin
pub fn is_archive(data: &[u8]) -> bool {
    data.starts_with(AR_MAGIC) || data.starts_with(AR_THIN_MAGIC)
}

/// ELF class (32-bit or 64-bit).
///
/// Selected once when a file is opened; every class-dependent decoding
/// step (symbol info, relocation info, entry sizes) dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElfClass {
    Elf32 = 1,
    Elf64 = 2,
}

impl ElfClass {
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            1 => Ok(ElfClass::Elf32),
            2 => Ok(ElfClass::Elf64),
            _ => Err(ElfError::UnsupportedClass(val)),
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 64,
        }
    }

    /// `ELF32_ST_BIND` / `ELF64_ST_BIND`
    pub fn st_bind(&self, st_info: u8) -> u8 {
        match self {
            ElfClass::Elf32 => st_info >> 4,
            ElfClass::Elf64 => st_info >> 4,
        }
    }

    /// `ELF32_ST_TYPE` / `ELF64_ST_TYPE`
    pub fn st_type(&self, st_info: u8) -> u8 {
        match self {
            ElfClass::Elf32 => st_info & 0xf,
            ElfClass::Elf64 => st_info & 0xf,
        }
    }

    /// `ELF32_ST_VISIBILITY` / `ELF64_ST_VISIBILITY`
    pub fn st_visibility(&self, st_other: u8) -> u8 {
        st_other & 0x3
    }

    /// `ELF32_R_SYM` / `ELF64_R_SYM`
    pub fn r_sym(&self, r_info: u64) -> u32 {
        match self {
            ElfClass::Elf32 => ((r_info as u32) >> 8),
            ElfClass::Elf64 => (r_info >> 32) as u32,
        }
    }

    /// `ELF32_R_TYPE` / `ELF64_R_TYPE`
    pub fn r_type(&self, r_info: u64) -> u32 {
        match self {
            ElfClass::Elf32 => (r_info as u32) & 0xff,
            ElfClass::Elf64 => (r_info & 0xffff_ffff) as u32,
        }
    }

    /// `ELF32_R_INFO` / `ELF64_R_INFO`
    pub fn r_info(&self, sym: u32, typ: u32) -> u64 {
        match self {
            ElfClass::Elf32 => (((sym as u64) << 8) | (typ as u64 & 0xff)) & 0xffff_ffff,
            ElfClass::Elf64 => ((sym as u64) << 32) | typ as u64,
        }
    }

    /// Size of one symbol table entry
    pub fn sym_size(&self) -> usize {
        match self {
            ElfClass::Elf32 => 16,
            ElfClass::Elf64 => 24,
        }
    }

    /// Size of one relocation entry
    pub fn reloc_size(&self, is_rela: bool) -> usize {
        match (self, is_rela) {
            (ElfClass::Elf32, false) => 8,
            (ElfClass::Elf32, true) => 12,
            (ElfClass::Elf64, false) => 16,
            (ElfClass::Elf64, true) => 24,
        }
    }
}

impl fmt::Display for ElfClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ELF{}", self.bits())
    }
}

/// ELF data encoding (endianness)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfData {
    Little = 1,
    Big = 2,
}

impl ElfData {
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            1 => Ok(ElfData::Little),
            2 => Ok(ElfData::Big),
            _ => Err(ElfError::UnsupportedData(val)),
        }
    }

    pub fn is_little_endian(&self) -> bool {
        matches!(self, ElfData::Little)
    }
}

/// ELF identification (first 16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfIdent {
    pub class: ElfClass,
    pub data: ElfData,
    pub version: u8,
    pub osabi: u8,
    pub abiversion: u8,
}

/// ELF file header, widened to 64-bit fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFileHeader {
    pub ident: ElfIdent,
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

/// Section header, widened to 64-bit fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

impl RawSectionHeader {
    /// Section holds symbols
    pub fn is_symtab(&self) -> bool {
        matches!(self.sh_type, SHT_SYMTAB | SHT_DYNSYM)
    }

    /// Section holds relocations of either variant
    pub fn is_reloc(&self) -> bool {
        matches!(self.sh_type, SHT_REL | SHT_RELA)
    }
}

/// Section types
pub const SHT_NULL: u32 = 0;
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_RELA: u32 = 4;
pub const SHT_HASH: u32 = 5;
pub const SHT_DYNAMIC: u32 = 6;
pub const SHT_NOTE: u32 = 7;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_REL: u32 = 9;
pub const SHT_SHLIB: u32 = 10;
pub const SHT_DYNSYM: u32 = 11;
pub const SHT_GNU_HASH: u32 = 0x6ffffff6;
pub const SHT_GNU_VERSYM: u32 = 0x6fffffff;
pub const SHT_GNU_VERNEED: u32 = 0x6ffffffe;

/// Section flags
pub const SHF_WRITE: u64 = 0x1;
pub const SHF_ALLOC: u64 = 0x2;
pub const SHF_EXECINSTR: u64 = 0x4;
pub const SHF_MERGE: u64 = 0x10;
pub const SHF_STRINGS: u64 = 0x20;
pub const SHF_INFO_LINK: u64 = 0x40;
pub const SHF_TLS: u64 = 0x400;
pub const SHF_COMPRESSED: u64 = 0x800;

/// Special section indices
pub const SHN_UNDEF: u16 = 0;
pub const SHN_LORESERVE: u16 = 0xff00;
pub const SHN_ABS: u16 = 0xfff1;
pub const SHN_COMMON: u16 = 0xfff2;
pub const SHN_XINDEX: u16 = 0xffff;

/// Symbol table entry, widened to 64-bit fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSymbol {
    pub st_name: u32,
    pub st_value: u64,
    pub st_size: u64,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
}

impl RawSymbol {
    pub fn is_undefined(&self) -> bool {
        self.st_shndx == SHN_UNDEF
    }
}

/// Symbol binding
pub const STB_LOCAL: u8 = 0;
pub const STB_GLOBAL: u8 = 1;
pub const STB_WEAK: u8 = 2;
pub const STB_GNU_UNIQUE: u8 = 10;

/// Symbol types
pub const STT_NOTYPE: u8 = 0;
pub const STT_OBJECT: u8 = 1;
pub const STT_FUNC: u8 = 2;
pub const STT_SECTION: u8 = 3;
pub const STT_FILE: u8 = 4;
pub const STT_COMMON: u8 = 5;
pub const STT_TLS: u8 = 6;
pub const STT_GNU_IFUNC: u8 = 10;

/// Symbol visibility
pub const STV_DEFAULT: u8 = 0;
pub const STV_INTERNAL: u8 = 1;
pub const STV_HIDDEN: u8 = 2;
pub const STV_PROTECTED: u8 = 3;

/// Relocation entry. `r_addend` is `None` for `SHT_REL` entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawRelocation {
    pub r_offset: u64,
    pub r_info: u64,
    pub r_addend: Option<i64>,
}

/// One chunk of a section's bytes.
///
/// `offset` is relative to the start of the section; a section's data may
/// be split into several blocks that need not be contiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDataBlock {
    pub offset: u64,
    pub bytes: Bytes,
}

impl RawDataBlock {
    pub fn new(offset: u64, bytes: impl Into<Bytes>) -> Self {
        Self {
            offset,
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Header of an archive member
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArchiveHeader {
    pub name: String,
    pub date: u64,
    pub uid: u64,
    pub gid: u64,
    pub mode: u64,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_magic() {
        assert!(is_archive(b"!<arch>\nfoo.o/"));
        assert!(is_archive(b"!<thin>\n"));
        assert!(!is_archive(b"!<arch>"));
        assert!(!is_archive(ELF_MAGIC));
    }

    #[test]
    fn test_class_from_u8() {
        assert_eq!(ElfClass::from_u8(1).unwrap(), ElfClass::Elf32);
        assert_eq!(ElfClass::from_u8(2).unwrap(), ElfClass::Elf64);
        assert_eq!(ElfClass::from_u8(3), Err(ElfError::UnsupportedClass(3)));
    }

    #[test]
    fn test_r_info_per_class() {
        let info64 = ElfClass::Elf64.r_info(7, 1);
        assert_eq!(info64, (7u64 << 32) | 1);
        assert_eq!(ElfClass::Elf64.r_sym(info64), 7);
        assert_eq!(ElfClass::Elf64.r_type(info64), 1);

        let info32 = ElfClass::Elf32.r_info(7, 1);
        assert_eq!(info32, 0x701);
        assert_eq!(ElfClass::Elf32.r_sym(info32), 7);
        assert_eq!(ElfClass::Elf32.r_type(info32), 1);

        // The same raw value decodes differently depending on class
        assert_ne!(ElfClass::Elf32.r_sym(info64), ElfClass::Elf64.r_sym(info64));
    }

    #[test]
    fn test_st_info_decoding() {
        let info = (STB_WEAK << 4) | STT_OBJECT;
        for class in [ElfClass::Elf32, ElfClass::Elf64] {
            assert_eq!(class.st_bind(info), STB_WEAK);
            assert_eq!(class.st_type(info), STT_OBJECT);
        }
    }

    #[test]
    fn test_section_header_kinds() {
        let symtab = RawSectionHeader {
            sh_type: SHT_DYNSYM,
            ..Default::default()
        };
        assert!(symtab.is_symtab());
        assert!(!symtab.is_reloc());

        let rel = RawSectionHeader {
            sh_type: SHT_REL,
            ..Default::default()
        };
        assert!(rel.is_reloc());
    }
}
