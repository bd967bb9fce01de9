//! Archive (`ar`) member access

use crate::formats::elf::image::ElfImage;
use crate::formats::elf::types::*;
use bytes::Bytes;
use object::read::archive::ArchiveFile;
use std::collections::VecDeque;
use std::ops::Range;
use tracing::{debug, warn};

#[derive(Debug)]
struct PendingMember {
    range: Range<usize>,
    header: RawArchiveHeader,
}

/// Sequential reader over the ELF members of an archive.
///
/// The member table is read once when the archive is opened; every member
/// image is parsed only when `open_member` reaches it. Members that are not
/// ELF objects and members of thin archives are skipped.
#[derive(Debug)]
pub struct ArchiveReader {
    data: Option<Bytes>,
    pending: VecDeque<PendingMember>,
}

impl ArchiveReader {
    pub fn parse(data: Bytes) -> Result<Self> {
        let pending = Self::scan_members(&data)?;
        debug!(members = pending.len(), "Opened archive");
        Ok(Self {
            data: Some(data),
            pending,
        })
    }

    fn scan_members(data: &[u8]) -> Result<VecDeque<PendingMember>> {
        let archive =
            ArchiveFile::parse(data).map_err(|e| ElfError::MalformedArchive(e.to_string()))?;

        let mut pending = VecDeque::new();
        for member in archive.members() {
            let member = member.map_err(|e| ElfError::MalformedArchive(e.to_string()))?;
            let name = String::from_utf8_lossy(member.name()).into_owned();

            if member.is_thin() {
                warn!(member = %name, "Skipping thin archive member");
                continue;
            }

            let (start, size) = member.file_range();
            let range = usize::try_from(start)
                .ok()
                .zip(usize::try_from(size).ok())
                .and_then(|(start, size)| Some(start..start.checked_add(size)?))
                .filter(|range| range.end <= data.len())
                .ok_or_else(|| {
                    ElfError::MalformedArchive(format!("member {} exceeds archive bounds", name))
                })?;

            if !data[range.clone()].starts_with(ELF_MAGIC) {
                debug!(member = %name, "Skipping non-ELF archive member");
                continue;
            }

            pending.push_back(PendingMember {
                header: RawArchiveHeader {
                    name,
                    date: member.date().unwrap_or(0),
                    uid: member.uid().unwrap_or(0),
                    gid: member.gid().unwrap_or(0),
                    mode: member.mode().unwrap_or(0),
                    size,
                },
                range,
            });
        }
        Ok(pending)
    }

    /// Members not yet opened
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Open the next ELF member, or `None` once the archive is exhausted.
    ///
    /// Exhaustion releases the archive buffer; later calls keep returning
    /// `None`.
    pub fn open_member(&mut self) -> Result<Option<ElfImage>> {
        let Some(data) = self.data.as_ref() else {
            return Ok(None);
        };

        match self.pending.pop_front() {
            Some(member) => {
                debug!(member = %member.header.name, "Opening archive member");
                let image = ElfImage::parse(data.slice(member.range))?;
                Ok(Some(image.with_archive_header(member.header)))
            }
            None => {
                self.close();
                Ok(None)
            }
        }
    }

    /// Release the archive buffer. Images already opened keep their own views.
    pub fn close(&mut self) {
        if self.data.take().is_some() {
            self.pending.clear();
            debug!("Released archive");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.data.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ar_member(name: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n",
            format!("{}/", name),
            0,
            0,
            0,
            644,
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(b'\n');
        }
        out
    }

    #[test]
    fn test_skips_non_elf_members() {
        let mut data = b"!<arch>\n".to_vec();
        data.extend(ar_member("notes.txt", b"hello"));
        let mut reader = ArchiveReader::parse(Bytes::from(data)).unwrap();
        assert_eq!(reader.remaining(), 0);
        assert!(reader.open_member().unwrap().is_none());
        assert!(reader.is_closed());
        assert!(reader.open_member().unwrap().is_none());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            ArchiveReader::parse(Bytes::from_static(b"not an archive")),
            Err(ElfError::MalformedArchive(_))
        ));
    }
}
