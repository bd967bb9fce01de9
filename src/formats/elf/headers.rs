//! File and section header decoding

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_addr, EndianRead};

/// Parse ELF identification bytes
pub fn parse_ident(data: &[u8]) -> Result<ElfIdent> {
    if data.len() < 16 {
        return Err(ElfError::Truncated {
            offset: 0,
            needed: 16,
        });
    }

    if &data[0..4] != ELF_MAGIC {
        return Err(ElfError::InvalidMagic);
    }

    Ok(ElfIdent {
        class: ElfClass::from_u8(data[4])?,
        data: ElfData::from_u8(data[5])?,
        version: data[6],
        osabi: data[7],
        abiversion: data[8],
    })
}

/// Size of the file header and of one section header for a class
pub fn header_sizes(class: ElfClass) -> (usize, usize) {
    match class {
        ElfClass::Elf32 => (52, 40),
        ElfClass::Elf64 => (64, 64),
    }
}

/// Parse the ELF file header.
///
/// Fields after `e_entry`/`e_phoff`/`e_shoff` sit at a class-dependent
/// displacement: the three address fields are 4 bytes wide on ELF32 and 8 on
/// ELF64, so everything behind them shifts by 12 bytes.
pub fn parse_header(data: &[u8]) -> Result<RawFileHeader> {
    let ident = parse_ident(data)?;
    let class = ident.class;
    let endian = ident.data;

    let (ehsize, shentsize) = header_sizes(class);
    if data.len() < ehsize {
        return Err(ElfError::Truncated {
            offset: 0,
            needed: ehsize,
        });
    }

    let word = match class {
        ElfClass::Elf32 => 4,
        ElfClass::Elf64 => 8,
    };
    let tail = 24 + 3 * word;

    let header = RawFileHeader {
        ident,
        e_type: data.read_u16(16, endian)?,
        e_machine: data.read_u16(18, endian)?,
        e_version: data.read_u32(20, endian)?,
        e_entry: read_addr(data, 24, class, endian)?,
        e_phoff: read_addr(data, 24 + word, class, endian)?,
        e_shoff: read_addr(data, 24 + 2 * word, class, endian)?,
        e_flags: data.read_u32(tail, endian)?,
        e_ehsize: data.read_u16(tail + 4, endian)?,
        e_phentsize: data.read_u16(tail + 6, endian)?,
        e_phnum: data.read_u16(tail + 8, endian)?,
        e_shentsize: data.read_u16(tail + 10, endian)?,
        e_shnum: data.read_u16(tail + 12, endian)?,
        e_shstrndx: data.read_u16(tail + 14, endian)?,
    };

    if header.e_ehsize as usize != ehsize {
        return Err(ElfError::MalformedHeader(format!(
            "Invalid e_ehsize: expected {}, got {}",
            ehsize, header.e_ehsize
        )));
    }

    if header.e_shnum > 0 && header.e_shentsize as usize != shentsize {
        return Err(ElfError::MalformedHeader(format!(
            "Invalid e_shentsize: expected {}, got {}",
            shentsize, header.e_shentsize
        )));
    }

    Ok(header)
}

/// Parse a single section header at `offset`
pub fn parse_section_header(
    data: &[u8],
    offset: usize,
    class: ElfClass,
    endian: ElfData,
) -> Result<RawSectionHeader> {
    let (_, shentsize) = header_sizes(class);
    if offset.checked_add(shentsize).map_or(true, |end| end > data.len()) {
        return Err(ElfError::Truncated {
            offset,
            needed: shentsize,
        });
    }

    match class {
        ElfClass::Elf32 => Ok(RawSectionHeader {
            sh_name: data.read_u32(offset, endian)?,
            sh_type: data.read_u32(offset + 4, endian)?,
            sh_flags: data.read_u32(offset + 8, endian)? as u64,
            sh_addr: data.read_u32(offset + 12, endian)? as u64,
            sh_offset: data.read_u32(offset + 16, endian)? as u64,
            sh_size: data.read_u32(offset + 20, endian)? as u64,
            sh_link: data.read_u32(offset + 24, endian)?,
            sh_info: data.read_u32(offset + 28, endian)?,
            sh_addralign: data.read_u32(offset + 32, endian)? as u64,
            sh_entsize: data.read_u32(offset + 36, endian)? as u64,
        }),
        ElfClass::Elf64 => Ok(RawSectionHeader {
            sh_name: data.read_u32(offset, endian)?,
            sh_type: data.read_u32(offset + 4, endian)?,
            sh_flags: data.read_u64(offset + 8, endian)?,
            sh_addr: data.read_u64(offset + 16, endian)?,
            sh_offset: data.read_u64(offset + 24, endian)?,
            sh_size: data.read_u64(offset + 32, endian)?,
            sh_link: data.read_u32(offset + 40, endian)?,
            sh_info: data.read_u32(offset + 44, endian)?,
            sh_addralign: data.read_u64(offset + 48, endian)?,
            sh_entsize: data.read_u64(offset + 56, endian)?,
        }),
    }
}
