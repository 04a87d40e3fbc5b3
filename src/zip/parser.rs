//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For extraction, read each file's Local File Header and data
//!
//! This approach is efficient for HTTP Range requests, as we only
//! need to fetch the file's tail to list contents.

use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Typically used through [`ZipExtractor`](super::ZipExtractor)
/// rather than directly.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Returns the record and its offset in the archive. Bytes after the
    /// record are tolerated whether or not its comment length accounts for
    /// them.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let size = self.reader.size();
        let record_size = EndOfCentralDirectory::SIZE as u64;
        if size < record_size {
            return Err(ZipError::EocdNotFound);
        }

        // Common case first: no comment, so the record is the last 22 bytes
        let offset = size - record_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.read_exact_at(offset, &mut buf).await?;
        if buf[0..4] == EndOfCentralDirectory::SIGNATURE_BYTES {
            return Ok((EndOfCentralDirectory::decode_tail(&buf)?, offset));
        }

        // Otherwise fetch the whole window a comment could occupy in one
        // read and search it backwards
        let search_size = (MAX_COMMENT_SIZE + record_size).min(size);
        let search_start = size - search_size;
        let mut window = vec![0u8; search_size as usize];
        self.read_exact_at(search_start, &mut window).await?;

        let pos = scan_for_eocd(&window).ok_or(ZipError::EocdNotFound)?;
        let eocd = EndOfCentralDirectory::decode_tail(&window[pos..])?;
        Ok((eocd, search_start + pos as u64))
    }

    /// List all files in the ZIP archive.
    ///
    /// Reads the EOCD first, then fetches and parses the entire Central
    /// Directory in a single read.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;
        debug!(
            entries = eocd.total_entries,
            cd_offset = eocd.cd_offset,
            cd_size = eocd.cd_size,
            eocd_offset,
            "found end of central directory"
        );

        // The directory must sit before the record that describes it
        let cd_end = u64::from(eocd.cd_offset) + u64::from(eocd.cd_size);
        if cd_end > eocd_offset {
            return Err(ZipError::CorruptCentralDirectory);
        }

        let mut cd_data = vec![0u8; eocd.cd_size as usize];
        self.read_exact_at(u64::from(eocd.cd_offset), &mut cd_data)
            .await?;

        parse_central_directory(&cd_data)
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry, so
    /// the header itself is read to find where the data begins.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LocalFileHeader::SIZE];
        let read = self.reader.read_fully_at(entry.lfh_offset, &mut lfh_buf).await?;
        if read < 4 {
            return Err(ZipError::ShortRead {
                expected: LocalFileHeader::SIZE,
                actual: read,
            });
        }

        let header = match LocalFileHeader::decode(&lfh_buf[..read])? {
            // The name and extra field were not fetched; only the fixed part matters
            Decode::Incomplete { needed } if read == LocalFileHeader::SIZE => {
                let variable = (needed - LocalFileHeader::SIZE) as u64;
                return Ok(entry.lfh_offset + LocalFileHeader::SIZE as u64 + variable);
            }
            Decode::Incomplete { .. } => {
                return Err(ZipError::ShortRead {
                    expected: LocalFileHeader::SIZE,
                    actual: read,
                });
            }
            Decode::Complete { record, .. } => record,
        };

        Ok(entry.lfh_offset + header.encoded_len() as u64)
    }

    /// Read an entry's compressed bytes.
    pub async fn read_raw_data(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let data_offset = self.get_data_offset(entry).await?;
        let available = self.reader.size().saturating_sub(data_offset);
        if entry.compressed_size > available {
            return Err(ZipError::ShortRead {
                expected: entry.compressed_size as usize,
                actual: available as usize,
            });
        }
        let mut buf = vec![0u8; entry.compressed_size as usize];
        self.read_exact_at(data_offset, &mut buf).await?;
        Ok(buf)
    }

    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let read = self.reader.read_fully_at(offset, buf).await?;
        if read != buf.len() {
            return Err(ZipError::ShortRead {
                expected: buf.len(),
                actual: read,
            });
        }
        Ok(())
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Search `window` backwards for the EOCD signature and return its position.
///
/// Instead of stepping one byte at a time, a mismatching window is skipped
/// by as much as its first byte allows: a match one to three bytes earlier
/// would need that byte to be the second, third or fourth byte of the
/// signature (`PK\x05\x06`).
pub fn scan_for_eocd(window: &[u8]) -> Option<usize> {
    let sig = EndOfCentralDirectory::SIGNATURE_BYTES;
    if window.len() < EndOfCentralDirectory::SIZE {
        return None;
    }

    let mut pos = window.len() - EndOfCentralDirectory::SIZE;
    loop {
        if window[pos..pos + 4] == sig {
            return Some(pos);
        }
        let skip = match window[pos] {
            0x06 => 3,
            0x05 => 2,
            0x4b => 1,
            _ => 4,
        };
        pos = pos.checked_sub(skip)?;
    }
}

/// Parse every record of a Central Directory block.
pub fn parse_central_directory(data: &[u8]) -> Result<Vec<ZipFileEntry>> {
    let mut entries = Vec::new();
    let mut index = 0;

    while index < data.len() {
        match CentralDirectoryEntry::decode(&data[index..])? {
            Decode::Complete { record, len } => {
                entries.push(ZipFileEntry::from(&record));
                index += len;
            }
            // A record running past the block the EOCD describes
            Decode::Incomplete { .. } => return Err(ZipError::CorruptCentralDirectory),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_signature_at_every_alignment() {
        for padding in 0..9 {
            let mut window = vec![0x4b; padding];
            window.extend_from_slice(&EndOfCentralDirectory::SIGNATURE_BYTES);
            window.extend_from_slice(&[0u8; 18]);
            window.extend_from_slice(&vec![0x06; 7]);
            assert_eq!(scan_for_eocd(&window), Some(padding), "padding {}", padding);
        }
    }

    #[test]
    fn scan_ignores_partial_signatures() {
        let mut window = b"PK\x05\x05PK\x05".to_vec();
        window.extend_from_slice(&[0u8; 30]);
        assert_eq!(scan_for_eocd(&window), None);
        assert_eq!(scan_for_eocd(&[0u8; 10]), None);
    }

    #[test]
    fn truncated_directory_is_corrupt() {
        let entry = CentralDirectoryEntry {
            version_made_by: 20,
            version_needed: 20,
            flags: FLAG_UTF8,
            compression_method: CompressionMethod::Stored,
            last_modified: DosDateTime::default(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            disk_start: 0,
            internal_attributes: 0,
            external_attributes: 0x10,
            local_header_offset: 0,
            file_name: b"dir/".to_vec(),
            extra: Vec::new(),
            comment: Vec::new(),
        };
        let bytes = entry.encode();
        let parsed = parse_central_directory(&bytes).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].is_directory);

        assert!(matches!(
            parse_central_directory(&bytes[..bytes.len() - 1]),
            Err(ZipError::CorruptCentralDirectory)
        ));
    }
}
