use ahash::AHashMap;
use flate2::{Decompress, FlushDecompress};
use winnow::combinator::repeat;
use winnow::prelude::*;

use crate::errors::ZipError;
use crate::structs::{CentralDirectoryEntry, EndOfCentralDirectory, LocalFileHeader};

/// Represents a parsed zip archive
pub struct ZipEntry {
    input: Vec<u8>,
    entries: AHashMap<String, CentralDirectoryEntry>,
}

impl ZipEntry {
    pub fn new(input: Vec<u8>) -> Result<ZipEntry, ZipError> {
        // perform basic sanity check
        if !input.starts_with(b"PK\x03\x04") {
            return Err(ZipError::InvalidHeader);
        }

        let eocd_offset =
            EndOfCentralDirectory::locate(&input).ok_or(ZipError::NotFoundEOCD)?;

        let eocd = EndOfCentralDirectory::parse(&mut &input[eocd_offset..])
            .map_err(|_| ZipError::ParseError)?;

        let mut directory = input
            .get(eocd.central_dir_offset as usize..)
            .ok_or(ZipError::EOF)?;

        let entries: Vec<CentralDirectoryEntry> =
            repeat(0.., CentralDirectoryEntry::parse)
                .parse_next(&mut directory)
                .map_err(|_| ZipError::ParseError)?;

        if entries.len() < eocd.total_entries as usize {
            log::warn!(
                "central directory lists {} entries, parsed {}",
                eocd.total_entries,
                entries.len()
            );
        }

        Ok(ZipEntry {
            input,
            entries: entries
                .into_iter()
                .map(|entry| (entry.file_name.clone(), entry))
                .collect(),
        })
    }

    /// Get list of the filenames from zip archive
    pub fn namelist(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Read a member's uncompressed payload
    pub fn read(&self, filename: &str) -> Result<Vec<u8>, ZipError> {
        let entry = self.entries.get(filename).ok_or(ZipError::FileNotFound)?;

        let local_header = LocalFileHeader::parse(&self.input, entry.local_header_offset as usize)
            .map_err(|_| ZipError::ParseError)?;

        // streaming tools leave the sizes in the central directory only
        let (compressed_size, uncompressed_size) =
            if local_header.compressed_size == 0 || local_header.uncompressed_size == 0 {
                (
                    entry.compressed_size as usize,
                    entry.uncompressed_size as usize,
                )
            } else {
                (
                    local_header.compressed_size as usize,
                    local_header.uncompressed_size as usize,
                )
            };

        let offset = entry.local_header_offset as usize + local_header.size();
        let get_slice = |start: usize, end: usize| self.input.get(start..end).ok_or(ZipError::EOF);

        match local_header.compression_method {
            0 => {
                // stored (no compression)
                let slice = get_slice(offset, offset + uncompressed_size)?;
                Ok(slice.to_vec())
            }
            8 => {
                // deflate default
                let compressed_data = get_slice(offset, offset + compressed_size)?;
                let mut uncompressed_data = Vec::with_capacity(uncompressed_size);

                Decompress::new(false)
                    .decompress_vec(
                        compressed_data,
                        &mut uncompressed_data,
                        FlushDecompress::Finish,
                    )
                    .map_err(|_| ZipError::DecompressionError)?;

                Ok(uncompressed_data)
            }
            method => {
                log::warn!("unsupported compression method {method} for {filename}");
                Err(ZipError::DecompressionError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal stored-entry archive by hand.
    fn stored_archive(name: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();

        // local file header
        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&[0u8; 4]); // version, flags
        out.extend_from_slice(&0u16.to_le_bytes()); // stored
        out.extend_from_slice(&[0u8; 8]); // times, crc
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(payload);

        // central directory
        let cd_offset = out.len() as u32;
        out.extend_from_slice(&0x02014b50u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 6]); // versions, flags
        out.extend_from_slice(&0u16.to_le_bytes()); // stored
        out.extend_from_slice(&[0u8; 8]); // times, crc
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 8]); // extra, comment, disk, internal attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // local header offset
        out.extend_from_slice(name.as_bytes());

        let cd_size = out.len() as u32 - cd_offset;

        // eocd
        out.extend_from_slice(&[0x50, 0x4B, 0x05, 0x06]);
        out.extend_from_slice(&[0u8; 4]); // disks
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // comment length

        out
    }

    #[test]
    fn read_stored_member() {
        let archive = stored_archive("classes.dex", b"payload");
        let zip = ZipEntry::new(archive).unwrap();

        assert_eq!(zip.namelist().collect::<Vec<_>>(), vec!["classes.dex"]);
        assert_eq!(zip.read("classes.dex").unwrap(), b"payload");
    }

    #[test]
    fn missing_member_is_an_error() {
        let archive = stored_archive("classes.dex", b"payload");
        let zip = ZipEntry::new(archive).unwrap();

        assert!(matches!(
            zip.read("classes2.dex"),
            Err(ZipError::FileNotFound)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            ZipEntry::new(b"not a zip at all".to_vec()),
            Err(ZipError::InvalidHeader)
        ));
    }
}
