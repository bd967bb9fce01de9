//! In-memory accessor for building ELF graphs without a backing file.
//!
//! Useful for fixtures: sections can carry several non-contiguous data
//! blocks, which the byte-level parser never produces.

use crate::formats::elf::headers::header_sizes;
use crate::formats::elf::types::*;
use crate::formats::elf::utils::read_cstring;
use std::borrow::Cow;
use crate::formats::elf::RawAccessor;

/// Index of the section-name string table in every synthetic file
pub const SHSTRTAB_INDEX: usize = 1;

#[derive(Debug, Clone, Default)]
struct SyntheticSection {
    header: RawSectionHeader,
    blocks: Vec<RawDataBlock>,
    strings: Option<Vec<u8>>,
    symbols: Vec<RawSymbol>,
    relocations: Vec<RawRelocation>,
}

/// A hand-assembled ELF file.
///
/// Starts with the null section and `.shstrtab`; every other section is
/// added through the builder methods, which return the new section's index.
#[derive(Debug, Clone)]
pub struct SyntheticElf {
    class: ElfClass,
    e_type: u16,
    sections: Vec<SyntheticSection>,
    archive_header: Option<RawArchiveHeader>,
    closed: bool,
}

impl SyntheticElf {
    pub fn new(class: ElfClass) -> Self {
        let mut elf = Self {
            class,
            e_type: 1, // ET_REL
            sections: vec![SyntheticSection::default()],
            archive_header: None,
            closed: false,
        };
        elf.sections.push(SyntheticSection {
            header: RawSectionHeader {
                sh_type: SHT_STRTAB,
                sh_addralign: 1,
                ..Default::default()
            },
            strings: Some(vec![0]),
            ..Default::default()
        });
        let name = elf.add_string(SHSTRTAB_INDEX, ".shstrtab");
        elf.sections[SHSTRTAB_INDEX].header.sh_name = name;
        elf
    }

    /// Set `e_type` (defaults to `ET_REL`)
    pub fn with_type(mut self, e_type: u16) -> Self {
        self.e_type = e_type;
        self
    }

    pub fn with_archive_header(mut self, header: RawArchiveHeader) -> Self {
        self.archive_header = Some(header);
        self
    }

    /// Add a section with explicit data blocks.
    ///
    /// A zero `sh_size` is replaced by the end of the furthest block.
    pub fn add_section(
        &mut self,
        name: &str,
        mut header: RawSectionHeader,
        blocks: Vec<RawDataBlock>,
    ) -> usize {
        header.sh_name = self.add_string(SHSTRTAB_INDEX, name);
        if header.sh_size == 0 {
            header.sh_size = blocks
                .iter()
                .map(|b| b.offset + b.size())
                .max()
                .unwrap_or(0);
        }
        self.push(SyntheticSection {
            header,
            blocks,
            ..Default::default()
        })
    }

    /// Add a writable, allocated `SHT_PROGBITS` section backed by one block
    pub fn add_progbits(&mut self, name: &str, addr: u64, bytes: &[u8]) -> usize {
        self.add_section(
            name,
            RawSectionHeader {
                sh_type: SHT_PROGBITS,
                sh_flags: SHF_ALLOC | SHF_WRITE,
                sh_addr: addr,
                sh_addralign: 1,
                ..Default::default()
            },
            vec![RawDataBlock::new(0, bytes.to_vec())],
        )
    }

    /// Add an empty string table
    pub fn add_strtab(&mut self, name: &str) -> usize {
        let sh_name = self.add_string(SHSTRTAB_INDEX, name);
        self.push(SyntheticSection {
            header: RawSectionHeader {
                sh_name,
                sh_type: SHT_STRTAB,
                sh_addralign: 1,
                ..Default::default()
            },
            strings: Some(vec![0]),
            ..Default::default()
        })
    }

    /// Append a string to a string table and return its offset.
    ///
    /// Panics if `strtab` is neither `.shstrtab` nor a table from `add_strtab`.
    pub fn add_string(&mut self, strtab: usize, s: &str) -> u32 {
        let strings = self.sections[strtab]
            .strings
            .as_mut()
            .expect("section is not a synthetic string table");
        let offset = strings.len() as u32;
        strings.extend_from_slice(s.as_bytes());
        strings.push(0);
        offset
    }

    /// Add a symbol table (`SHT_SYMTAB` or `SHT_DYNSYM`) linked to `strtab`.
    ///
    /// The table starts with the reserved null symbol.
    pub fn add_symtab(&mut self, name: &str, sh_type: u32, strtab: usize) -> usize {
        let sh_name = self.add_string(SHSTRTAB_INDEX, name);
        self.push(SyntheticSection {
            header: RawSectionHeader {
                sh_name,
                sh_type,
                sh_link: strtab as u32,
                sh_info: 1,
                sh_addralign: 8,
                sh_entsize: self.class.sym_size() as u64,
                ..Default::default()
            },
            symbols: vec![RawSymbol::default()],
            ..Default::default()
        })
    }

    /// Append a symbol named `name` and return its index in the table
    pub fn add_symbol(&mut self, symtab: usize, name: &str, mut sym: RawSymbol) -> usize {
        let strtab = self.sections[symtab].header.sh_link as usize;
        sym.st_name = self.add_string(strtab, name);
        let symbols = &mut self.sections[symtab].symbols;
        symbols.push(sym);
        symbols.len() - 1
    }

    /// Add a relocation section (`SHT_REL` or `SHT_RELA`) applying to `target`
    pub fn add_reloc_section(
        &mut self,
        name: &str,
        sh_type: u32,
        symtab: usize,
        target: usize,
    ) -> usize {
        let sh_name = self.add_string(SHSTRTAB_INDEX, name);
        self.push(SyntheticSection {
            header: RawSectionHeader {
                sh_name,
                sh_type,
                sh_flags: SHF_INFO_LINK,
                sh_link: symtab as u32,
                sh_info: target as u32,
                sh_addralign: 8,
                sh_entsize: self.class.reloc_size(sh_type == SHT_RELA) as u64,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Append a relocation entry; `r_addend` is dropped for `SHT_REL` sections
    pub fn add_relocation(&mut self, section: usize, mut rel: RawRelocation) -> usize {
        let entry = &mut self.sections[section];
        if entry.header.sh_type == SHT_REL {
            rel.r_addend = None;
        }
        entry.relocations.push(rel);
        entry.relocations.len() - 1
    }

    fn push(&mut self, section: SyntheticSection) -> usize {
        self.sections.push(section);
        self.sections.len() - 1
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(ElfError::Closed)
        } else {
            Ok(())
        }
    }

    fn section(&self, index: usize) -> Result<&SyntheticSection> {
        self.check_open()?;
        self.sections
            .get(index)
            .ok_or(ElfError::InvalidSectionIndex(index))
    }
}

impl RawAccessor for SyntheticElf {
    fn class(&self) -> ElfClass {
        self.class
    }

    fn file_header(&self) -> Result<RawFileHeader> {
        self.check_open()?;
        let (ehsize, shentsize) = header_sizes(self.class);
        Ok(RawFileHeader {
            ident: ElfIdent {
                class: self.class,
                data: ElfData::Little,
                version: 1,
                osabi: 0,
                abiversion: 0,
            },
            e_type: self.e_type,
            e_machine: 0,
            e_version: 1,
            e_entry: 0,
            e_phoff: 0,
            e_shoff: 0,
            e_flags: 0,
            e_ehsize: ehsize as u16,
            e_phentsize: 0,
            e_phnum: 0,
            e_shentsize: shentsize as u16,
            e_shnum: self.sections.len() as u16,
            e_shstrndx: SHSTRTAB_INDEX as u16,
        })
    }

    fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn section_header(&self, index: usize) -> Result<RawSectionHeader> {
        let section = self.section(index)?;
        let mut header = section.header;
        if let Some(strings) = &section.strings {
            header.sh_size = strings.len() as u64;
        } else if header.is_symtab() {
            header.sh_size = (section.symbols.len() * self.class.sym_size()) as u64;
        } else if header.is_reloc() {
            let entsize = self.class.reloc_size(header.sh_type == SHT_RELA);
            header.sh_size = (section.relocations.len() * entsize) as u64;
        }
        Ok(header)
    }

    fn section_data(&self, index: usize) -> Result<Vec<RawDataBlock>> {
        let section = self.section(index)?;
        match &section.strings {
            Some(strings) => Ok(vec![RawDataBlock::new(0, strings.clone())]),
            None => Ok(section.blocks.clone()),
        }
    }

    fn string(&self, strtab: usize, offset: u32) -> Result<String> {
        let section = self.section(strtab)?;
        let strings = section
            .strings
            .as_deref()
            .ok_or(ElfError::InvalidSectionIndex(strtab))?;
        read_cstring(strings, offset as usize).map(Cow::into_owned)
    }

    fn symbol_entries(&self, index: usize) -> Result<Vec<RawSymbol>> {
        Ok(self.section(index)?.symbols.clone())
    }

    fn relocation_entries(&self, index: usize) -> Result<Vec<RawRelocation>> {
        Ok(self.section(index)?.relocations.clone())
    }

    fn archive_header(&self) -> Option<RawArchiveHeader> {
        self.archive_header.clone()
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_names_resolve() {
        let mut elf = SyntheticElf::new(ElfClass::Elf64);
        let data = elf.add_progbits(".data", 0x1000, &[1, 2, 3, 4]);
        assert_eq!(data, 2);

        let header = elf.section_header(data).unwrap();
        assert_eq!(elf.string(SHSTRTAB_INDEX, header.sh_name).unwrap(), ".data");
        assert_eq!(header.sh_size, 4);
        assert_eq!(elf.file_header().unwrap().e_shnum, 3);
    }

    #[test]
    fn test_symbols_and_relocations() {
        let mut elf = SyntheticElf::new(ElfClass::Elf32);
        let text = elf.add_progbits(".text", 0, &[0; 16]);
        let strtab = elf.add_strtab(".strtab");
        let symtab = elf.add_symtab(".symtab", SHT_SYMTAB, strtab);
        let main = elf.add_symbol(
            symtab,
            "main",
            RawSymbol {
                st_shndx: text as u16,
                st_size: 16,
                ..Default::default()
            },
        );
        assert_eq!(main, 1);

        let rel = elf.add_reloc_section(".rel.text", SHT_REL, symtab, text);
        elf.add_relocation(
            rel,
            RawRelocation {
                r_offset: 4,
                r_info: ElfClass::Elf32.r_info(1, 2),
                r_addend: Some(-4),
            },
        );

        let syms = elf.symbol_entries(symtab).unwrap();
        assert_eq!(syms.len(), 2);
        assert_eq!(elf.string(strtab, syms[1].st_name).unwrap(), "main");
        assert_eq!(elf.section_header(symtab).unwrap().sh_size, 32);

        let rels = elf.relocation_entries(rel).unwrap();
        assert_eq!(rels[0].r_addend, None);
        assert_eq!(elf.section_header(rel).unwrap().sh_size, 8);
    }

    #[test]
    fn test_fragmented_section_size() {
        let mut elf = SyntheticElf::new(ElfClass::Elf64);
        let idx = elf.add_section(
            ".frag",
            RawSectionHeader {
                sh_type: SHT_PROGBITS,
                ..Default::default()
            },
            vec![
                RawDataBlock::new(0, vec![0u8; 4]),
                RawDataBlock::new(8, vec![0u8; 4]),
            ],
        );
        assert_eq!(elf.section_header(idx).unwrap().sh_size, 12);
        assert_eq!(elf.section_data(idx).unwrap().len(), 2);
    }

    #[test]
    fn test_closed_accessor_rejects_reads() {
        let mut elf = SyntheticElf::new(ElfClass::Elf64);
        elf.close().unwrap();
        assert_eq!(elf.file_header(), Err(ElfError::Closed));
        assert_eq!(elf.section_data(0), Err(ElfError::Closed));
    }
}
