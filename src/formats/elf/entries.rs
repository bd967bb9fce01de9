//! Symbol and relocation entry decoding

use crate::formats::elf::types::*;
use crate::formats::elf::utils::EndianRead;

/// Decode every whole symbol entry in `data`; a trailing partial entry is ignored
pub fn parse_symbols(data: &[u8], class: ElfClass, endian: ElfData) -> Result<Vec<RawSymbol>> {
    data.chunks_exact(class.sym_size())
        .map(|entry| parse_symbol(entry, class, endian))
        .collect()
}

/// Decode every whole relocation entry in `data`
pub fn parse_relocations(
    data: &[u8],
    class: ElfClass,
    endian: ElfData,
    is_rela: bool,
) -> Result<Vec<RawRelocation>> {
    data.chunks_exact(class.reloc_size(is_rela))
        .map(|entry| parse_relocation(entry, class, endian, is_rela))
        .collect()
}

/// Parse a single symbol entry
pub fn parse_symbol(data: &[u8], class: ElfClass, endian: ElfData) -> Result<RawSymbol> {
    let needed = class.sym_size();
    if data.len() < needed {
        return Err(ElfError::Truncated { offset: 0, needed });
    }

    match class {
        ElfClass::Elf32 => Ok(RawSymbol {
            st_name: data.read_u32(0, endian)?,
            st_value: data.read_u32(4, endian)? as u64,
            st_size: data.read_u32(8, endian)? as u64,
            st_info: data[12],
            st_other: data[13],
            st_shndx: data.read_u16(14, endian)?,
        }),
        ElfClass::Elf64 => Ok(RawSymbol {
            st_name: data.read_u32(0, endian)?,
            st_info: data[4],
            st_other: data[5],
            st_shndx: data.read_u16(6, endian)?,
            st_value: data.read_u64(8, endian)?,
            st_size: data.read_u64(16, endian)?,
        }),
    }
}

/// Parse a single relocation entry
pub fn parse_relocation(
    data: &[u8],
    class: ElfClass,
    endian: ElfData,
    is_rela: bool,
) -> Result<RawRelocation> {
    match class {
        ElfClass::Elf32 => Ok(RawRelocation {
            r_offset: data.read_u32(0, endian)? as u64,
            r_info: data.read_u32(4, endian)? as u64,
            r_addend: if is_rela {
                Some(data.read_i32(8, endian)? as i64)
            } else {
                None
            },
        }),
        ElfClass::Elf64 => Ok(RawRelocation {
            r_offset: data.read_u64(0, endian)?,
            r_info: data.read_u64(8, endian)?,
            r_addend: if is_rela {
                Some(data.read_i64(16, endian)?)
            } else {
                None
            },
        }),
    }
}
