//! Raw zip structures.
//!
//! Only the fields the reader actually consults are decoded; runs of
//! uninteresting header bytes are skipped in one go.

use memchr::memmem;
use winnow::binary::{le_u16, le_u32};
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

/// End of central directory record
#[derive(Debug)]
pub(crate) struct EndOfCentralDirectory {
    pub(crate) total_entries: u16,
    pub(crate) central_dir_offset: u32,
}

impl EndOfCentralDirectory {
    const MAGIC: u32 = 0x06054b50;

    /// The record is 22 fixed bytes plus a comment of at most `u16::MAX`
    /// bytes, so its magic can only live that far from the end of the
    /// archive. One reverse search over that tail finds it.
    pub(crate) fn locate(input: &[u8]) -> Option<usize> {
        let span = input.len().min(22 + u16::MAX as usize);
        let tail = input.len() - span;
        memmem::rfind(&input[tail..], &Self::MAGIC.to_le_bytes()).map(|hit| tail + hit)
    }

    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<EndOfCentralDirectory> {
        le_u32.verify(|magic| *magic == Self::MAGIC).parse_next(input)?;

        let _disks = take(6usize).parse_next(input)?;
        let total_entries = le_u16.parse_next(input)?;
        let _directory_size = le_u32.parse_next(input)?;
        let central_dir_offset = le_u32.parse_next(input)?;

        Ok(EndOfCentralDirectory {
            total_entries,
            central_dir_offset,
        })
    }
}

/// Central directory entry for a single archive member
#[derive(Debug)]
pub(crate) struct CentralDirectoryEntry {
    pub(crate) compressed_size: u32,
    pub(crate) uncompressed_size: u32,
    pub(crate) local_header_offset: u32,
    pub(crate) file_name: String,
}

impl CentralDirectoryEntry {
    const MAGIC: u32 = 0x02014b50;

    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<CentralDirectoryEntry> {
        le_u32.verify(|magic| *magic == Self::MAGIC).parse_next(input)?;

        // versions, flags, method, timestamps, crc
        let _ = take(16usize).parse_next(input)?;
        let (compressed_size, uncompressed_size) = (le_u32, le_u32).parse_next(input)?;
        let (name_len, extra_len, comment_len) = (le_u16, le_u16, le_u16).parse_next(input)?;
        // disk number and attributes
        let _ = take(8usize).parse_next(input)?;
        let local_header_offset = le_u32.parse_next(input)?;

        let name = take(name_len).parse_next(input)?;
        let file_name = String::from_utf8_lossy(name).to_string();
        let _ = take(extra_len as usize + comment_len as usize).parse_next(input)?;

        Ok(CentralDirectoryEntry {
            compressed_size,
            uncompressed_size,
            local_header_offset,
            file_name,
        })
    }
}

/// Local file header preceding each member's data
#[derive(Debug)]
pub(crate) struct LocalFileHeader {
    pub(crate) compression_method: u16,
    pub(crate) compressed_size: u32,
    pub(crate) uncompressed_size: u32,
    file_name_length: u16,
    extra_field_length: u16,
}

impl LocalFileHeader {
    const MAGIC: u32 = 0x04034b50;

    pub(crate) fn parse(input: &[u8], offset: usize) -> ModalResult<LocalFileHeader> {
        let mut rest = input
            .get(offset..)
            .ok_or(ErrMode::Incomplete(Needed::Unknown))?;

        le_u32
            .verify(|magic| *magic == Self::MAGIC)
            .parse_next(&mut rest)?;

        // version and general-purpose flags
        let _ = take(4usize).parse_next(&mut rest)?;
        let compression_method = le_u16.parse_next(&mut rest)?;
        // timestamps and crc
        let _ = take(8usize).parse_next(&mut rest)?;
        let (compressed_size, uncompressed_size) = (le_u32, le_u32).parse_next(&mut rest)?;
        let (file_name_length, extra_field_length) = (le_u16, le_u16).parse_next(&mut rest)?;

        Ok(LocalFileHeader {
            compression_method,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
        })
    }

    /// Bytes from the start of the header to the member data: 30 fixed
    /// plus the two variable-length trailers.
    #[inline]
    pub(crate) fn size(&self) -> usize {
        30 + self.file_name_length as usize + self.extra_field_length as usize
    }
}
