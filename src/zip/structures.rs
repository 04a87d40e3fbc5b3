use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use std::time::SystemTime;

use crate::error::{Result, ZipError};

/// General purpose flag: crc and sizes follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag: file name and comment are UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Outcome of decoding a record from the front of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decode<T> {
    /// The record was decoded and occupies the first `len` bytes.
    Complete { record: T, len: usize },
    /// The buffer ends before the record does. `needed` is the record's
    /// length as far as it can be determined from the bytes present.
    Incomplete { needed: usize },
}

impl<T> Decode<T> {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Decode::Incomplete { .. })
    }
}

/// Read the little-endian signature at the front of `buf`, if four bytes are present.
pub fn peek_signature(buf: &[u8]) -> Option<u32> {
    (buf.len() >= 4).then(|| LittleEndian::read_u32(&buf[..4]))
}

/// Decode an entry name according to the UTF-8 flag, falling back to Latin-1.
pub fn decode_name(raw: &[u8], flags: u16) -> String {
    if flags & FLAG_UTF8 != 0 {
        String::from_utf8_lossy(raw).into_owned()
    } else {
        raw.iter().map(|&b| b as char).collect()
    }
}

/// MS-DOS timestamp: date in the high 16 bits, time in the low 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DosDateTime(u32);

impl Default for DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant.
    fn default() -> Self {
        Self::from_components(1980, 1, 1, 0, 0, 0)
    }
}

impl DosDateTime {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Pack calendar components. Years before 1980 clamp to the DOS epoch.
    pub fn from_components(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        if year < 1980 {
            return Self((1 << 21) | (1 << 16));
        }
        let year = u32::from((year - 1980).min(127));
        Self(
            (year << 25)
                | (u32::from(month) << 21)
                | (u32::from(day) << 16)
                | (u32::from(hour) << 11)
                | (u32::from(minute) << 5)
                | (u32::from(second) >> 1),
        )
    }

    /// Pack the wall-clock fields of `time` as seen in its own zone.
    pub fn from_datetime<Tz: TimeZone>(time: &DateTime<Tz>) -> Self {
        Self::from_components(
            u16::try_from(time.year()).unwrap_or(0),
            time.month() as u8,
            time.day() as u8,
            time.hour() as u8,
            time.minute() as u8,
            time.second() as u8,
        )
    }

    /// Convert a system time to local wall-clock time.
    pub fn from_system_time(time: SystemTime) -> Self {
        Self::from_datetime(&DateTime::<Local>::from(time))
    }

    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn time(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    pub fn date(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn year(&self) -> u16 {
        ((self.date() >> 9) & 0x7F) + 1980
    }

    pub fn month(&self) -> u8 {
        ((self.date() >> 5) & 0x0F) as u8
    }

    pub fn day(&self) -> u8 {
        (self.date() & 0x1F) as u8
    }

    pub fn hour(&self) -> u8 {
        ((self.time() >> 11) & 0x1F) as u8
    }

    pub fn minute(&self) -> u8 {
        ((self.time() >> 5) & 0x3F) as u8
    }

    pub fn second(&self) -> u8 {
        ((self.time() & 0x1F) * 2) as u8
    }
}

/// Local File Header (LFH) - 30 bytes plus name and extra field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: Vec<u8>,
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = 0x04034b50;
    pub const SIZE: usize = 30;

    pub fn decode(buf: &[u8]) -> Result<Decode<Self>> {
        match peek_signature(buf) {
            None => return Ok(Decode::Incomplete { needed: Self::SIZE }),
            Some(Self::SIGNATURE) => {}
            Some(_) => return Err(ZipError::CorruptLocalHeader),
        }
        if buf.len() < Self::SIZE {
            return Ok(Decode::Incomplete { needed: Self::SIZE });
        }

        let mut cursor = Cursor::new(&buf[4..Self::SIZE]);
        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_modified = cursor.read_u32::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()? as usize;
        let extra_len = cursor.read_u16::<LittleEndian>()? as usize;

        let len = Self::SIZE + name_len + extra_len;
        if buf.len() < len {
            return Ok(Decode::Incomplete { needed: len });
        }
        let name_end = Self::SIZE + name_len;

        Ok(Decode::Complete {
            record: Self {
                version_needed,
                flags,
                compression_method: CompressionMethod::from_u16(compression_method),
                last_modified: DosDateTime::from_raw(last_modified),
                crc32,
                compressed_size,
                uncompressed_size,
                file_name: buf[Self::SIZE..name_end].to_vec(),
                extra: buf[name_end..len].to_vec(),
            },
            len,
        })
    }

    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.file_name.len() + self.extra.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        LittleEndian::write_u32(&mut buf[0..4], Self::SIGNATURE);
        LittleEndian::write_u16(&mut buf[4..6], self.version_needed);
        LittleEndian::write_u16(&mut buf[6..8], self.flags);
        LittleEndian::write_u16(&mut buf[8..10], self.compression_method.as_u16());
        LittleEndian::write_u32(&mut buf[10..14], self.last_modified.raw());
        LittleEndian::write_u32(&mut buf[14..18], self.crc32);
        LittleEndian::write_u32(&mut buf[18..22], self.compressed_size);
        LittleEndian::write_u32(&mut buf[22..26], self.uncompressed_size);
        LittleEndian::write_u16(&mut buf[26..28], self.file_name.len() as u16);
        LittleEndian::write_u16(&mut buf[28..30], self.extra.len() as u16);
        let name_end = Self::SIZE + self.file_name.len();
        buf[Self::SIZE..name_end].copy_from_slice(&self.file_name);
        buf[name_end..].copy_from_slice(&self.extra);
        buf
    }

    pub fn name(&self) -> String {
        decode_name(&self.file_name, self.flags)
    }

    /// Whether the entry's size is only known from a trailing data descriptor.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }
}

/// Data descriptor trailing a streamed entry - always 16 bytes with signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub const SIGNATURE: u32 = 0x08074b50;
    pub const SIGNATURE_BYTES: [u8; 4] = [0x50, 0x4b, 0x07, 0x08];
    pub const SIZE: usize = 16;

    pub fn decode(buf: &[u8]) -> Result<Decode<Self>> {
        match peek_signature(buf) {
            None => return Ok(Decode::Incomplete { needed: Self::SIZE }),
            Some(Self::SIGNATURE) => {}
            Some(_) => return Err(ZipError::CorruptDataDescriptor),
        }
        if buf.len() < Self::SIZE {
            return Ok(Decode::Incomplete { needed: Self::SIZE });
        }

        Ok(Decode::Complete {
            record: Self {
                crc32: LittleEndian::read_u32(&buf[4..8]),
                compressed_size: LittleEndian::read_u32(&buf[8..12]),
                uncompressed_size: LittleEndian::read_u32(&buf[12..16]),
            },
            len: Self::SIZE,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], Self::SIGNATURE);
        LittleEndian::write_u32(&mut buf[4..8], self.crc32);
        LittleEndian::write_u32(&mut buf[8..12], self.compressed_size);
        LittleEndian::write_u32(&mut buf[12..16], self.uncompressed_size);
        buf
    }
}

/// Central Directory File Header (CDFH) - 46 bytes plus name, extra field and comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_start: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub local_header_offset: u32,
    pub file_name: Vec<u8>,
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
}

impl CentralDirectoryEntry {
    pub const SIGNATURE: u32 = 0x02014b50;
    pub const SIZE: usize = 46;

    pub fn decode(buf: &[u8]) -> Result<Decode<Self>> {
        match peek_signature(buf) {
            None => return Ok(Decode::Incomplete { needed: Self::SIZE }),
            Some(Self::SIGNATURE) => {}
            Some(_) => return Err(ZipError::CorruptCentralDirectory),
        }
        if buf.len() < Self::SIZE {
            return Ok(Decode::Incomplete { needed: Self::SIZE });
        }

        let mut cursor = Cursor::new(&buf[4..Self::SIZE]);
        let version_made_by = cursor.read_u16::<LittleEndian>()?;
        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_modified = cursor.read_u32::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()? as usize;
        let extra_len = cursor.read_u16::<LittleEndian>()? as usize;
        let comment_len = cursor.read_u16::<LittleEndian>()? as usize;
        let disk_start = cursor.read_u16::<LittleEndian>()?;
        let internal_attributes = cursor.read_u16::<LittleEndian>()?;
        let external_attributes = cursor.read_u32::<LittleEndian>()?;
        let local_header_offset = cursor.read_u32::<LittleEndian>()?;

        let len = Self::SIZE + name_len + extra_len + comment_len;
        if buf.len() < len {
            return Ok(Decode::Incomplete { needed: len });
        }
        let name_end = Self::SIZE + name_len;
        let extra_end = name_end + extra_len;

        Ok(Decode::Complete {
            record: Self {
                version_made_by,
                version_needed,
                flags,
                compression_method: CompressionMethod::from_u16(compression_method),
                last_modified: DosDateTime::from_raw(last_modified),
                crc32,
                compressed_size,
                uncompressed_size,
                disk_start,
                internal_attributes,
                external_attributes,
                local_header_offset,
                file_name: buf[Self::SIZE..name_end].to_vec(),
                extra: buf[name_end..extra_end].to_vec(),
                comment: buf[extra_end..len].to_vec(),
            },
            len,
        })
    }

    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.file_name.len() + self.extra.len() + self.comment.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        LittleEndian::write_u32(&mut buf[0..4], Self::SIGNATURE);
        LittleEndian::write_u16(&mut buf[4..6], self.version_made_by);
        LittleEndian::write_u16(&mut buf[6..8], self.version_needed);
        LittleEndian::write_u16(&mut buf[8..10], self.flags);
        LittleEndian::write_u16(&mut buf[10..12], self.compression_method.as_u16());
        LittleEndian::write_u32(&mut buf[12..16], self.last_modified.raw());
        LittleEndian::write_u32(&mut buf[16..20], self.crc32);
        LittleEndian::write_u32(&mut buf[20..24], self.compressed_size);
        LittleEndian::write_u32(&mut buf[24..28], self.uncompressed_size);
        LittleEndian::write_u16(&mut buf[28..30], self.file_name.len() as u16);
        LittleEndian::write_u16(&mut buf[30..32], self.extra.len() as u16);
        LittleEndian::write_u16(&mut buf[32..34], self.comment.len() as u16);
        LittleEndian::write_u16(&mut buf[34..36], self.disk_start);
        LittleEndian::write_u16(&mut buf[36..38], self.internal_attributes);
        LittleEndian::write_u32(&mut buf[38..42], self.external_attributes);
        LittleEndian::write_u32(&mut buf[42..46], self.local_header_offset);
        let name_end = Self::SIZE + self.file_name.len();
        let extra_end = name_end + self.extra.len();
        buf[Self::SIZE..name_end].copy_from_slice(&self.file_name);
        buf[name_end..extra_end].copy_from_slice(&self.extra);
        buf[extra_end..].copy_from_slice(&self.comment);
        buf
    }

    pub fn name(&self) -> String {
        decode_name(&self.file_name, self.flags)
    }
}

/// End of Central Directory (EOCD) - 22 bytes plus comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x06054b50;
    pub const SIGNATURE_BYTES: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
    pub const SIZE: usize = 22;

    pub fn decode(buf: &[u8]) -> Result<Decode<Self>> {
        match peek_signature(buf) {
            None => return Ok(Decode::Incomplete { needed: Self::SIZE }),
            Some(Self::SIGNATURE) => {}
            Some(_) => return Err(ZipError::CorruptEndOfCentralDirectory),
        }
        if buf.len() < Self::SIZE {
            return Ok(Decode::Incomplete { needed: Self::SIZE });
        }
        let comment_len = LittleEndian::read_u16(&buf[20..22]) as usize;
        let len = Self::SIZE + comment_len;
        if buf.len() < len {
            return Ok(Decode::Incomplete { needed: len });
        }

        let mut record = Self::decode_fixed(&buf[..Self::SIZE])?;
        record.comment = buf[Self::SIZE..len].to_vec();
        Ok(Decode::Complete { record, len })
    }

    /// Decode a record found at the tail of an archive. Trailing bytes that
    /// disagree with the declared comment length are tolerated: whatever
    /// comment bytes are present are kept.
    pub fn decode_tail(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(ZipError::EocdNotFound);
        }
        if peek_signature(buf) != Some(Self::SIGNATURE) {
            return Err(ZipError::CorruptEndOfCentralDirectory);
        }
        let comment_len = LittleEndian::read_u16(&buf[20..22]) as usize;
        let comment_end = (Self::SIZE + comment_len).min(buf.len());

        let mut record = Self::decode_fixed(&buf[..Self::SIZE])?;
        record.comment = buf[Self::SIZE..comment_end].to_vec();
        Ok(record)
    }

    fn decode_fixed(buf: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(&buf[4..Self::SIZE]);
        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment: Vec::new(),
        })
    }

    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.comment.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        LittleEndian::write_u32(&mut buf[0..4], Self::SIGNATURE);
        LittleEndian::write_u16(&mut buf[4..6], self.disk_number);
        LittleEndian::write_u16(&mut buf[6..8], self.disk_with_cd);
        LittleEndian::write_u16(&mut buf[8..10], self.disk_entries);
        LittleEndian::write_u16(&mut buf[10..12], self.total_entries);
        LittleEndian::write_u32(&mut buf[12..16], self.cd_size);
        LittleEndian::write_u32(&mut buf[16..20], self.cd_offset);
        LittleEndian::write_u16(&mut buf[20..22], self.comment.len() as u16);
        buf[Self::SIZE..].copy_from_slice(&self.comment);
        buf
    }
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_modified: DosDateTime,
    pub is_directory: bool,
    pub comment: String,
}

impl From<&CentralDirectoryEntry> for ZipFileEntry {
    fn from(record: &CentralDirectoryEntry) -> Self {
        let file_name = record.name();
        // Directory entries end with '/'
        let is_directory = file_name.ends_with('/');
        Self {
            is_directory,
            file_name,
            flags: record.flags,
            compression_method: record.compression_method,
            compressed_size: u64::from(record.compressed_size),
            uncompressed_size: u64::from(record.uncompressed_size),
            crc32: record.crc32,
            lfh_offset: u64::from(record.local_header_offset),
            last_modified: record.last_modified,
            comment: decode_name(&record.comment, record.flags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use std::time::{Duration, UNIX_EPOCH};

    fn sample_local_header() -> LocalFileHeader {
        LocalFileHeader {
            version_needed: 20,
            flags: FLAG_UTF8,
            compression_method: CompressionMethod::Deflate,
            last_modified: DosDateTime::from_components(2023, 6, 15, 13, 45, 30),
            crc32: 0xDEADBEEF,
            compressed_size: 120,
            uncompressed_size: 400,
            file_name: b"three-files/donut.txt".to_vec(),
            extra: vec![0xAA, 0xBB],
        }
    }

    #[test]
    fn local_header_layout() {
        let bytes = sample_local_header().encode();
        assert_eq!(bytes.len(), 30 + 21 + 2);
        assert_eq!(&bytes[0..4], b"PK\x03\x04");
        assert_eq!(LittleEndian::read_u16(&bytes[6..8]), FLAG_UTF8);
        assert_eq!(LittleEndian::read_u16(&bytes[8..10]), 8);
        assert_eq!(LittleEndian::read_u32(&bytes[14..18]), 0xDEADBEEF);
        assert_eq!(LittleEndian::read_u32(&bytes[18..22]), 120);
        assert_eq!(LittleEndian::read_u32(&bytes[22..26]), 400);
        assert_eq!(LittleEndian::read_u16(&bytes[26..28]), 21);
        assert_eq!(LittleEndian::read_u16(&bytes[28..30]), 2);
        assert_eq!(&bytes[30..51], b"three-files/donut.txt");
    }

    #[test]
    fn local_header_decodes_what_it_encodes() {
        let header = sample_local_header();
        let bytes = header.encode();
        match LocalFileHeader::decode(&bytes).unwrap() {
            Decode::Complete { record, len } => {
                assert_eq!(len, bytes.len());
                assert_eq!(record, header);
                assert_eq!(record.name(), "three-files/donut.txt");
            }
            other => panic!("expected complete header, got {:?}", other),
        }
    }

    #[test]
    fn short_buffers_are_incomplete_not_corrupt() {
        let bytes = sample_local_header().encode();
        for cut in [0, 1, 3, 4, 29, 30, 50, bytes.len() - 1] {
            let decoded = LocalFileHeader::decode(&bytes[..cut]).unwrap();
            assert!(decoded.is_incomplete(), "cut at {}", cut);
        }
        assert_eq!(
            LocalFileHeader::decode(&bytes[..40]).unwrap(),
            Decode::Incomplete { needed: bytes.len() }
        );
    }

    #[test]
    fn wrong_signature_is_corrupt() {
        let mut bytes = sample_local_header().encode();
        bytes[2] = 0x01;
        assert!(matches!(
            LocalFileHeader::decode(&bytes),
            Err(ZipError::CorruptLocalHeader)
        ));
        assert!(matches!(
            CentralDirectoryEntry::decode(&bytes),
            Err(ZipError::CorruptCentralDirectory)
        ));
        assert!(matches!(
            DataDescriptor::decode(&bytes),
            Err(ZipError::CorruptDataDescriptor)
        ));
    }

    #[test]
    fn central_entry_layout() {
        let entry = CentralDirectoryEntry {
            version_made_by: 20,
            version_needed: 20,
            flags: FLAG_UTF8 | FLAG_DATA_DESCRIPTOR,
            compression_method: CompressionMethod::Stored,
            last_modified: DosDateTime::default(),
            crc32: 7,
            compressed_size: 11,
            uncompressed_size: 11,
            disk_start: 0,
            internal_attributes: 1,
            external_attributes: 0x80,
            local_header_offset: 0x01020304,
            file_name: b"a.txt".to_vec(),
            extra: Vec::new(),
            comment: b"File #1".to_vec(),
        };
        let bytes = entry.encode();
        assert_eq!(bytes.len(), 46 + 5 + 7);
        assert_eq!(LittleEndian::read_u16(&bytes[8..10]), FLAG_UTF8 | FLAG_DATA_DESCRIPTOR);
        assert_eq!(LittleEndian::read_u16(&bytes[32..34]), 7);
        assert_eq!(LittleEndian::read_u16(&bytes[36..38]), 1);
        assert_eq!(LittleEndian::read_u32(&bytes[38..42]), 0x80);
        assert_eq!(LittleEndian::read_u32(&bytes[42..46]), 0x01020304);

        let Decode::Complete { record, len } = CentralDirectoryEntry::decode(&bytes).unwrap() else {
            panic!("expected complete entry");
        };
        assert_eq!(len, bytes.len());
        assert_eq!(record, entry);
    }

    #[test]
    fn end_record_layout() {
        let end = EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: 3,
            total_entries: 3,
            cd_size: 150,
            cd_offset: 4096,
            comment: b"hi".to_vec(),
        };
        let bytes = end.encode();
        assert_eq!(&bytes[0..4], &EndOfCentralDirectory::SIGNATURE_BYTES);
        assert_eq!(LittleEndian::read_u16(&bytes[10..12]), 3);
        assert_eq!(LittleEndian::read_u32(&bytes[12..16]), 150);
        assert_eq!(LittleEndian::read_u32(&bytes[16..20]), 4096);
        assert_eq!(LittleEndian::read_u16(&bytes[20..22]), 2);
        assert!(EndOfCentralDirectory::decode(&bytes[..23]).unwrap().is_incomplete());

        let tail = EndOfCentralDirectory::decode_tail(&bytes[..23]).unwrap();
        assert_eq!(tail.comment, b"h");
        assert_eq!(tail.cd_offset, 4096);
    }

    #[test]
    fn legacy_names_decode_as_latin1() {
        assert_eq!(decode_name(&[0x63, 0x61, 0x66, 0xE9], 0), "café");
        assert_eq!(decode_name("café".as_bytes(), FLAG_UTF8), "café");
    }

    #[test]
    fn dos_datetime_packing() {
        let dt = DosDateTime::from_components(2024, 2, 29, 23, 59, 58);
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 2);
        assert_eq!(dt.day(), 29);
        assert_eq!(dt.hour(), 23);
        assert_eq!(dt.minute(), 59);
        assert_eq!(dt.second(), 58);
        assert_eq!(dt.raw() >> 25, 44);
    }

    #[test]
    fn dos_datetime_from_datetime() {
        let utc = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 8).unwrap();
        let dt = DosDateTime::from_datetime(&utc);
        assert_eq!(
            (dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute(), dt.second()),
            (2021, 3, 4, 5, 6, 8)
        );

        // Wall-clock fields of the zone are packed, not UTC
        let tokyo = utc.with_timezone(&FixedOffset::east_opt(9 * 3600).unwrap());
        let dt = DosDateTime::from_datetime(&tokyo);
        assert_eq!((dt.day(), dt.hour()), (4, 14));

        let old = Utc.with_ymd_and_hms(1975, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(DosDateTime::from_datetime(&old), DosDateTime::default());
    }

    #[test]
    fn system_time_is_stamped_in_local_time() {
        let time = UNIX_EPOCH + Duration::from_secs(1_614_834_368);
        let local = DateTime::<Local>::from(time);
        let dt = DosDateTime::from_system_time(time);
        assert_eq!(
            (dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute()),
            (2021, local.month() as u8, local.day() as u8, local.hour() as u8, local.minute() as u8)
        );
        assert_eq!(dt.second(), 8);
    }
}
