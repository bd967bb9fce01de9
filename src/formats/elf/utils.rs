//! Endian-aware field readers shared by the byte-level accessor

use crate::formats::elf::types::{ElfClass, ElfData, ElfError, Result};
use std::borrow::Cow;

/// Trait for reading values with endianness support
pub trait EndianRead {
    fn read_u16(&self, offset: usize, data: ElfData) -> Result<u16>;
    fn read_u32(&self, offset: usize, data: ElfData) -> Result<u32>;
    fn read_u64(&self, offset: usize, data: ElfData) -> Result<u64>;
    fn read_i32(&self, offset: usize, data: ElfData) -> Result<i32>;
    fn read_i64(&self, offset: usize, data: ElfData) -> Result<i64>;
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| bytes.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or(ElfError::Truncated { offset, needed: N })
}

macro_rules! endian_reader {
    ($name:ident, $ty:ty, $n:literal) => {
        fn $name(&self, offset: usize, data: ElfData) -> Result<$ty> {
            let bytes = read_array::<$n>(self, offset)?;
            Ok(match data {
                ElfData::Little => <$ty>::from_le_bytes(bytes),
                ElfData::Big => <$ty>::from_be_bytes(bytes),
            })
        }
    };
}

impl EndianRead for [u8] {
    endian_reader!(read_u16, u16, 2);
    endian_reader!(read_u32, u32, 4);
    endian_reader!(read_u64, u64, 8);
    endian_reader!(read_i32, i32, 4);
    endian_reader!(read_i64, i64, 8);
}

/// Read an address-sized field based on ELF class
pub fn read_addr(data: &[u8], offset: usize, class: ElfClass, endian: ElfData) -> Result<u64> {
    match class {
        ElfClass::Elf32 => data.read_u32(offset, endian).map(|v| v as u64),
        ElfClass::Elf64 => data.read_u64(offset, endian),
    }
}

/// Read a null-terminated string from data.
///
/// String tables hold raw bytes; invalid UTF-8 is replaced, not rejected.
pub fn read_cstring(data: &[u8], offset: usize) -> Result<Cow<'_, str>> {
    if offset >= data.len() {
        return Err(ElfError::InvalidOffset { offset });
    }

    let slice = &data[offset..];
    let end = memchr::memchr(0, slice).unwrap_or(slice.len());

    Ok(String::from_utf8_lossy(&slice[..end]))
}

/// Bounds-checked subslice of `data`
pub fn slice_at(data: &[u8], offset: u64, size: u64) -> Result<&[u8]> {
    let start = usize::try_from(offset).map_err(|_| ElfError::InvalidOffset { offset: usize::MAX })?;
    let len = usize::try_from(size).map_err(|_| ElfError::InvalidOffset { offset: start })?;
    start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or(ElfError::Truncated {
            offset: start,
            needed: len,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_read() {
        let data = vec![0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0];

        // Little endian
        assert_eq!(data.read_u16(0, ElfData::Little).unwrap(), 0x3412);
        assert_eq!(data.read_u32(0, ElfData::Little).unwrap(), 0x78563412);
        assert_eq!(
            data.read_u64(0, ElfData::Little).unwrap(),
            0xf0debc9a78563412
        );

        // Big endian
        assert_eq!(data.read_u16(0, ElfData::Big).unwrap(), 0x1234);
        assert_eq!(data.read_u32(0, ElfData::Big).unwrap(), 0x12345678);
        assert_eq!(data.read_u64(0, ElfData::Big).unwrap(), 0x123456789abcdef0);
    }

    #[test]
    fn test_read_past_end() {
        let data = [0u8; 4];
        assert_eq!(
            data.read_u32(2, ElfData::Little),
            Err(ElfError::Truncated {
                offset: 2,
                needed: 4
            })
        );
        assert!(data.read_u16(usize::MAX, ElfData::Little).is_err());
    }

    #[test]
    fn test_read_cstring() {
        let data = b"hello\0world\0";
        assert_eq!(read_cstring(data, 0).unwrap(), "hello");
        assert_eq!(read_cstring(data, 6).unwrap(), "world");

        let data = b"no_null_terminator";
        assert_eq!(read_cstring(data, 0).unwrap(), "no_null_terminator");
        assert!(read_cstring(data, 100).is_err());

        let data = b"bad\xffname\0";
        assert_eq!(read_cstring(data, 0).unwrap(), "bad\u{fffd}name");
    }

    #[test]
    fn test_slice_at() {
        let data = [1u8, 2, 3, 4, 5];
        assert_eq!(slice_at(&data, 1, 3).unwrap(), &[2, 3, 4]);
        assert!(slice_at(&data, 3, 3).is_err());
        assert!(slice_at(&data, u64::MAX, 1).is_err());
    }
}
