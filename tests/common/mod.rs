//! Common test utilities and helpers.
//!
//! `ElfBuilder` writes real ELF32/ELF64 images (either byte order) so the
//! byte-level accessor can be exercised end to end; the `fixtures` module
//! assembles in-memory files through `SyntheticElf`.

#![allow(dead_code)]

use elfgraph::formats::elf::{ElfClass, RawRelocation, RawSectionHeader, RawSymbol};

/// `ar` member with a GNU-style name
pub fn ar_member(name: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n",
        format!("{}/", name),
        1_700_000_000u64,
        1000,
        1000,
        100644,
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    if body.len() % 2 == 1 {
        out.push(b'\n');
    }
    out
}

/// Archive image from `(name, body)` members
pub fn ar_archive(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = b"!<arch>\n".to_vec();
    for (name, body) in members {
        out.extend(ar_member(name, body));
    }
    out
}

struct Writer {
    class: ElfClass,
    big_endian: bool,
    out: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }

    fn u16(&mut self, v: u16) {
        if self.big_endian {
            self.out.extend_from_slice(&v.to_be_bytes());
        } else {
            self.out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn u32(&mut self, v: u32) {
        if self.big_endian {
            self.out.extend_from_slice(&v.to_be_bytes());
        } else {
            self.out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn u64(&mut self, v: u64) {
        if self.big_endian {
            self.out.extend_from_slice(&v.to_be_bytes());
        } else {
            self.out.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// Address-sized field
    fn word(&mut self, v: u64) {
        match self.class {
            ElfClass::Elf32 => self.u32(v as u32),
            ElfClass::Elf64 => self.u64(v),
        }
    }

    fn align(&mut self, to: usize) {
        while self.out.len() % to != 0 {
            self.out.push(0);
        }
    }
}

struct BuiltSection {
    name: String,
    header: RawSectionHeader,
    data: Vec<u8>,
}

/// Writer for small relocatable ELF files.
///
/// Section 0 is the null section; `.shstrtab` is appended last by `build`.
pub struct ElfBuilder {
    class: ElfClass,
    big_endian: bool,
    e_type: u16,
    sections: Vec<BuiltSection>,
}

impl ElfBuilder {
    pub fn new(class: ElfClass) -> Self {
        Self {
            class,
            big_endian: false,
            e_type: 1,
            sections: Vec::new(),
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    fn writer(&self) -> Writer {
        Writer {
            class: self.class,
            big_endian: self.big_endian,
            out: Vec::new(),
        }
    }

    /// Add a section; returns its index
    pub fn section(&mut self, name: &str, header: RawSectionHeader, data: Vec<u8>) -> usize {
        self.sections.push(BuiltSection {
            name: name.to_string(),
            header,
            data,
        });
        self.sections.len()
    }

    pub fn progbits(&mut self, name: &str, addr: u64, flags: u64, data: &[u8]) -> usize {
        self.section(
            name,
            RawSectionHeader {
                sh_type: 1,
                sh_flags: flags,
                sh_addr: addr,
                sh_addralign: 1,
                ..Default::default()
            },
            data.to_vec(),
        )
    }

    pub fn nobits(&mut self, name: &str, addr: u64, flags: u64, size: u64) -> usize {
        self.section(
            name,
            RawSectionHeader {
                sh_type: 8,
                sh_flags: flags,
                sh_addr: addr,
                sh_size: size,
                sh_addralign: 1,
                ..Default::default()
            },
            Vec::new(),
        )
    }

    /// String table from `strings`; returns the index and each string's offset
    pub fn strtab(&mut self, name: &str, strings: &[&str]) -> (usize, Vec<u32>) {
        let mut data = vec![0u8];
        let mut offsets = Vec::new();
        for s in strings {
            offsets.push(data.len() as u32);
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }
        let index = self.section(
            name,
            RawSectionHeader {
                sh_type: 3,
                sh_addralign: 1,
                ..Default::default()
            },
            data,
        );
        (index, offsets)
    }

    /// Symbol table linked to `strtab`; the null symbol is prepended
    pub fn symtab(&mut self, name: &str, sh_type: u32, strtab: usize, syms: &[RawSymbol]) -> usize {
        let mut w = self.writer();
        for sym in std::iter::once(&RawSymbol::default()).chain(syms) {
            match self.class {
                ElfClass::Elf64 => {
                    w.u32(sym.st_name);
                    w.u8(sym.st_info);
                    w.u8(sym.st_other);
                    w.u16(sym.st_shndx);
                    w.u64(sym.st_value);
                    w.u64(sym.st_size);
                }
                ElfClass::Elf32 => {
                    w.u32(sym.st_name);
                    w.u32(sym.st_value as u32);
                    w.u32(sym.st_size as u32);
                    w.u8(sym.st_info);
                    w.u8(sym.st_other);
                    w.u16(sym.st_shndx);
                }
            }
        }
        self.section(
            name,
            RawSectionHeader {
                sh_type,
                sh_link: strtab as u32,
                sh_info: 1,
                sh_addralign: 8,
                sh_entsize: self.class.sym_size() as u64,
                ..Default::default()
            },
            w.out,
        )
    }

    /// `SHT_RELA` (when every entry has an addend) or `SHT_REL` section
    pub fn relocs(
        &mut self,
        name: &str,
        rela: bool,
        symtab: usize,
        target: usize,
        entries: &[RawRelocation],
    ) -> usize {
        let mut w = self.writer();
        for rel in entries {
            w.word(rel.r_offset);
            w.word(rel.r_info);
            if rela {
                w.word(rel.r_addend.unwrap_or(0) as u64);
            }
        }
        self.section(
            name,
            RawSectionHeader {
                sh_type: if rela { 4 } else { 9 },
                sh_flags: 0x40,
                sh_link: symtab as u32,
                sh_info: target as u32,
                sh_addralign: 8,
                sh_entsize: self.class.reloc_size(rela) as u64,
                ..Default::default()
            },
            w.out,
        )
    }

    pub fn build(mut self) -> Vec<u8> {
        // Section-name table goes last
        let mut shstrtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for section in &self.sections {
            name_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(section.name.as_bytes());
            shstrtab.push(0);
        }
        name_offsets.push(shstrtab.len() as u32);
        shstrtab.extend_from_slice(b".shstrtab\0");
        self.sections.push(BuiltSection {
            name: ".shstrtab".to_string(),
            header: RawSectionHeader {
                sh_type: 3,
                sh_addralign: 1,
                ..Default::default()
            },
            data: shstrtab,
        });

        let (ehsize, shentsize) = match self.class {
            ElfClass::Elf32 => (52usize, 40usize),
            ElfClass::Elf64 => (64, 64),
        };

        // Lay out section contents after the header
        let mut body = self.writer();
        body.out.resize(ehsize, 0);
        let mut headers = Vec::new();
        for (section, sh_name) in self.sections.iter().zip(&name_offsets) {
            body.align(8);
            let mut header = section.header;
            header.sh_name = *sh_name;
            header.sh_offset = body.out.len() as u64;
            if header.sh_type != 8 {
                header.sh_size = section.data.len() as u64;
                body.out.extend_from_slice(&section.data);
            }
            headers.push(header);
        }
        body.align(8);
        let shoff = body.out.len() as u64;

        // Section header table, null entry first
        let mut w = body;
        for header in std::iter::once(RawSectionHeader::default()).chain(headers) {
            w.u32(header.sh_name);
            w.u32(header.sh_type);
            w.word(header.sh_flags);
            w.word(header.sh_addr);
            w.word(header.sh_offset);
            w.word(header.sh_size);
            w.u32(header.sh_link);
            w.u32(header.sh_info);
            w.word(header.sh_addralign);
            w.word(header.sh_entsize);
        }
        let shnum = self.sections.len() + 1;

        // File header
        let mut h = self.writer();
        h.out.extend_from_slice(b"\x7fELF");
        h.u8(self.class.bits() / 32);
        h.u8(if self.big_endian { 2 } else { 1 });
        h.u8(1);
        h.out.resize(16, 0);
        h.u16(self.e_type);
        h.u16(62);
        h.u32(1);
        h.word(0); // e_entry
        h.word(0); // e_phoff
        h.word(shoff);
        h.u32(0);
        h.u16(ehsize as u16);
        h.u16(0);
        h.u16(0);
        h.u16(shentsize as u16);
        h.u16(shnum as u16);
        h.u16((shnum - 1) as u16);

        let mut out = w.out;
        out[..ehsize].copy_from_slice(&h.out);
        out
    }
}

/// `st_info` from binding and type
pub fn st_info(bind: u8, kind: u8) -> u8 {
    (bind << 4) | (kind & 0xf)
}

pub mod fixtures {
    use super::st_info;
    use elfgraph::formats::elf::{
        ElfClass, RawRelocation, RawSymbol, SyntheticElf, SHT_RELA, SHT_SYMTAB, STB_GLOBAL,
        STT_OBJECT,
    };

    /// Section indices of the `foo` fixture
    pub struct FooIndices {
        pub data: usize,
        pub symtab: usize,
        pub rela: usize,
    }

    /// One `.data` section of 32 bytes `0..32`, symbol `foo` at value 16
    /// size 8, and RELA entries at offsets 20 and 24.
    pub fn foo_object(class: ElfClass) -> (SyntheticElf, FooIndices) {
        let mut elf = SyntheticElf::new(class);
        let data = elf.add_progbits(".data", 0, &(0u8..32).collect::<Vec<_>>());
        let strtab = elf.add_strtab(".strtab");
        let symtab = elf.add_symtab(".symtab", SHT_SYMTAB, strtab);
        elf.add_symbol(
            symtab,
            "foo",
            RawSymbol {
                st_value: 16,
                st_size: 8,
                st_info: st_info(STB_GLOBAL, STT_OBJECT),
                st_shndx: data as u16,
                ..Default::default()
            },
        );
        let rela = elf.add_reloc_section(".rela.data", SHT_RELA, symtab, data);
        for offset in [24u64, 20] {
            elf.add_relocation(
                rela,
                RawRelocation {
                    r_offset: offset,
                    r_info: class.r_info(1, 1),
                    r_addend: Some(0),
                },
            );
        }
        (
            elf,
            FooIndices {
                data,
                symtab,
                rela,
            },
        )
    }
}
