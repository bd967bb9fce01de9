//! Byte-level accessor over an in-memory ELF image

use crate::formats::elf::entries::{parse_relocations, parse_symbols};
use crate::formats::elf::headers::{header_sizes, parse_header, parse_section_header};
use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_cstring, slice_at};
use std::borrow::Cow;
use crate::formats::elf::RawAccessor;
use bytes::Bytes;
use tracing::{debug, trace};

/// A parsed ELF image backed by a shared buffer.
///
/// Only the file header and section header table are decoded up front;
/// section contents, symbols and relocations are decoded on request.
#[derive(Debug)]
pub struct ElfImage {
    data: Option<Bytes>,
    header: RawFileHeader,
    sections: Vec<RawSectionHeader>,
    archive_header: Option<RawArchiveHeader>,
}

impl ElfImage {
    /// Parse the headers of an ELF image
    pub fn parse(data: Bytes) -> Result<Self> {
        let header = parse_header(&data)?;
        let sections = parse_section_table(&data, &header)?;

        debug!(
            class = %header.ident.class,
            sections = sections.len(),
            size = data.len(),
            "Parsed ELF image"
        );

        Ok(Self {
            data: Some(data),
            header,
            sections,
            archive_header: None,
        })
    }

    /// Attach the header of the archive member this image was read from
    pub fn with_archive_header(mut self, header: RawArchiveHeader) -> Self {
        self.archive_header = Some(header);
        self
    }

    fn data(&self) -> Result<&Bytes> {
        self.data.as_ref().ok_or(ElfError::Closed)
    }

    fn header_at(&self, index: usize) -> Result<&RawSectionHeader> {
        self.sections
            .get(index)
            .ok_or(ElfError::InvalidSectionIndex(index))
    }

    fn section_bytes(&self, index: usize) -> Result<Bytes> {
        let data = self.data()?;
        let sh = self.header_at(index)?;
        if matches!(sh.sh_type, SHT_NOBITS | SHT_NULL) {
            return Ok(Bytes::new());
        }
        let slice = slice_at(data, sh.sh_offset, sh.sh_size)?;
        Ok(data.slice_ref(slice))
    }
}

/// Parse the section header table, honouring extended section numbering
/// (`e_shnum == 0` with the real count in section 0's `sh_size`).
fn parse_section_table(data: &[u8], header: &RawFileHeader) -> Result<Vec<RawSectionHeader>> {
    if header.e_shoff == 0 {
        return Ok(Vec::new());
    }

    let class = header.ident.class;
    let endian = header.ident.data;
    let (_, entsize) = header_sizes(class);
    let shoff = usize::try_from(header.e_shoff)
        .map_err(|_| ElfError::InvalidOffset { offset: usize::MAX })?;

    let count = if header.e_shnum == 0 {
        let first = parse_section_header(data, shoff, class, endian)?;
        usize::try_from(first.sh_size).map_err(|_| ElfError::InvalidOffset { offset: shoff })?
    } else {
        header.e_shnum as usize
    };

    (0..count)
        .map(|i| {
            let offset = i
                .checked_mul(entsize)
                .and_then(|rel| rel.checked_add(shoff))
                .ok_or(ElfError::InvalidOffset { offset: shoff })?;
            parse_section_header(data, offset, class, endian)
        })
        .collect()
}

impl RawAccessor for ElfImage {
    fn class(&self) -> ElfClass {
        self.header.ident.class
    }

    fn file_header(&self) -> Result<RawFileHeader> {
        self.data()?;
        Ok(self.header)
    }

    fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn section_header(&self, index: usize) -> Result<RawSectionHeader> {
        self.data()?;
        self.header_at(index).copied()
    }

    fn section_data(&self, index: usize) -> Result<Vec<RawDataBlock>> {
        let bytes = self.section_bytes(index)?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![RawDataBlock::new(0, bytes)])
    }

    fn string(&self, strtab: usize, offset: u32) -> Result<String> {
        let bytes = self.section_bytes(strtab)?;
        trace!(strtab, offset, "String table lookup");
        read_cstring(&bytes, offset as usize).map(Cow::into_owned)
    }

    fn symbol_entries(&self, index: usize) -> Result<Vec<RawSymbol>> {
        let bytes = self.section_bytes(index)?;
        parse_symbols(&bytes, self.header.ident.class, self.header.ident.data)
    }

    fn relocation_entries(&self, index: usize) -> Result<Vec<RawRelocation>> {
        let is_rela = self.header_at(index)?.sh_type == SHT_RELA;
        let bytes = self.section_bytes(index)?;
        parse_relocations(
            &bytes,
            self.header.ident.class,
            self.header.ident.data,
            is_rela,
        )
    }

    fn archive_header(&self) -> Option<RawArchiveHeader> {
        self.archive_header.clone()
    }

    fn close(&mut self) -> Result<()> {
        if self.data.take().is_some() {
            debug!("Released ELF image");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ELF64 LE with sections: null, .text, .shstrtab
    fn create_test_elf_with_sections() -> Vec<u8> {
        let mut data = vec![0u8; 0x320];
        data[0..4].copy_from_slice(b"\x7fELF");
        data[4] = 2;
        data[5] = 1;
        data[6] = 1;
        data[16] = 2; // ET_EXEC
        data[18] = 62;
        data[20] = 1;
        data[41] = 0x01; // e_shoff = 0x100
        data[52] = 64; // e_ehsize
        data[58] = 64; // e_shentsize
        data[60] = 3; // e_shnum
        data[62] = 2; // e_shstrndx

        let text = 0x100 + 64;
        data[text] = 1; // sh_name
        data[text + 4] = 1; // SHT_PROGBITS
        data[text + 8] = 6; // SHF_ALLOC | SHF_EXECINSTR
        data[text + 17] = 0x10; // sh_addr = 0x1000
        data[text + 25] = 0x02; // sh_offset = 0x200
        data[text + 32] = 0x10; // sh_size

        let shstrtab = 0x100 + 128;
        data[shstrtab] = 7;
        data[shstrtab + 4] = 3; // SHT_STRTAB
        data[shstrtab + 25] = 0x03; // sh_offset = 0x300
        data[shstrtab + 32] = 0x11; // sh_size

        data[0x200..0x210].copy_from_slice(&[0x90; 16]);
        data[0x301..0x307].copy_from_slice(b".text\0");
        data[0x307..0x311].copy_from_slice(b".shstrtab\0");
        data
    }

    #[test]
    fn test_parse_section_table() {
        let image = ElfImage::parse(Bytes::from(create_test_elf_with_sections())).unwrap();
        assert_eq!(image.class(), ElfClass::Elf64);
        assert_eq!(image.section_count(), 3);

        let text = image.section_header(1).unwrap();
        assert_eq!(text.sh_type, SHT_PROGBITS);
        assert_eq!(text.sh_addr, 0x1000);
        assert_eq!(image.string(2, text.sh_name).unwrap(), ".text");
        assert_eq!(image.string(2, 7).unwrap(), ".shstrtab");
    }

    #[test]
    fn test_section_data_is_one_block() {
        let image = ElfImage::parse(Bytes::from(create_test_elf_with_sections())).unwrap();
        let blocks = image.section_data(1).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[0].bytes, &[0x90u8; 16][..]);
        assert!(image.section_data(0).unwrap().is_empty());
        assert!(matches!(
            image.section_data(9),
            Err(ElfError::InvalidSectionIndex(9))
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut image = ElfImage::parse(Bytes::from(create_test_elf_with_sections())).unwrap();
        image.close().unwrap();
        image.close().unwrap();
        assert!(matches!(image.file_header(), Err(ElfError::Closed)));
        assert!(matches!(image.section_data(1), Err(ElfError::Closed)));
    }

    #[test]
    fn test_no_section_table() {
        let mut data = create_test_elf_with_sections();
        data[41] = 0; // e_shoff = 0
        let image = ElfImage::parse(Bytes::from(data)).unwrap();
        assert_eq!(image.section_count(), 0);
    }
}
