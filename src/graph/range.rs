//! Address-range arithmetic over section data blocks and sorted
//! relocation lists.
//!
//! Ranges are half-open: `[start, start + size)`. A zero-sized range is a
//! point query at `start`.

use crate::formats::elf::RawDataBlock;
use memchr::memchr;

/// End of `[start, start + size)`, saturating at the top of the address space
pub fn range_end(start: u64, size: u64) -> u64 {
    start.saturating_add(size)
}

/// Whether the section `[base, base + len)` overlaps the queried range.
///
/// A zero-sized query matches when `start` lies inside the section; an
/// empty section never matches.
pub fn overlaps(base: u64, len: u64, start: u64, size: u64) -> bool {
    if len == 0 {
        return false;
    }
    let end = range_end(base, len);
    if size == 0 {
        base <= start && start < end
    } else {
        base < range_end(start, size) && start < end
    }
}

/// Bytes of `blocks` covering `[start, start + size)`.
///
/// Block `b` occupies `[base + b.offset, base + b.offset + b.size())`.
/// Covered pieces are concatenated in block order; the walk stops as soon
/// as `size` bytes have been collected.
pub fn mem_in_range(blocks: &[RawDataBlock], base: u64, start: u64, size: u64) -> Vec<u8> {
    let end = range_end(start, size);
    let mut out = Vec::with_capacity(size.min(4096) as usize);
    let mut remaining = size;

    for block in blocks {
        if remaining == 0 {
            break;
        }
        let block_start = base.saturating_add(block.offset);
        let block_end = block_start.saturating_add(block.size());
        if block_end <= start || block_start >= end {
            continue;
        }
        let lo = start.max(block_start);
        let hi = end.min(block_end);
        let from = (lo - block_start) as usize;
        let to = (hi - block_start) as usize;
        out.extend_from_slice(&block.bytes[from..to]);
        remaining = remaining.saturating_sub(hi - lo);
    }
    out
}

/// NUL-terminated byte string starting at `ptr`, without the terminator.
///
/// The scan continues into the next block only when it starts exactly
/// where the previous one ended. An unterminated string is cut at the end
/// of the last contiguous block. `None` if no block contains `ptr`.
pub fn str_at_addr(blocks: &[RawDataBlock], base: u64, ptr: u64) -> Option<Vec<u8>> {
    let first = blocks.iter().position(|b| {
        let block_start = base.saturating_add(b.offset);
        block_start <= ptr && ptr < block_start.saturating_add(b.size())
    })?;

    let mut out = Vec::new();
    let mut cursor = ptr;
    for block in &blocks[first..] {
        let block_start = base.saturating_add(block.offset);
        if block_start > cursor {
            break;
        }
        let from = (cursor - block_start) as usize;
        let tail = &block.bytes[from.min(block.bytes.len())..];
        if let Some(nul) = memchr(0, tail) {
            out.extend_from_slice(&tail[..nul]);
            return Some(out);
        }
        out.extend_from_slice(tail);
        cursor = block_start.saturating_add(block.size());
    }
    Some(out)
}

/// The sub-slice of `sorted` (ascending by offset) with offsets inside
/// `[start, start + size)`, located with two binary searches.
pub fn in_sorted_range<T: PartialOrd<u64>>(sorted: &[T], start: u64, size: u64) -> &[T] {
    let end = range_end(start, size);
    let lo = sorted.partition_point(|item| *item < start);
    let hi = lo + sorted[lo..].partition_point(|item| *item < end);
    &sorted[lo..hi]
}
