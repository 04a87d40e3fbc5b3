//! Archive writer.
//!
//! Entries are written in the order they arrive: a local header followed by
//! the (possibly deflated) data. The Central Directory and EOCD are emitted
//! once the item sequence ends.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use tracing::{debug, info};

use crate::error::{Result, ZipError};

use super::compression::compress;
use super::crc::crc32;
use super::structures::*;

/// Version needed to extract / made by: 2.0 (deflate, directories)
const ZIP_VERSION: u16 = 20;
const ATTR_TEXT: u16 = 0x0001;
const ATTR_DIRECTORY: u32 = 0x0010;
const ATTR_ARCHIVE: u32 = 0x0080;

/// One logical entry of an archive to be written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZipItem {
    pub name: String,
    pub data: Option<Vec<u8>>,
    pub comment: Option<String>,
    pub is_directory: bool,
    pub is_text: bool,
    /// Overrides [`WriterOptions::last_modified`] for this entry
    pub last_modified: Option<DosDateTime>,
}

impl ZipItem {
    pub fn file(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// A file flagged as text in its internal attributes
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            is_text: true,
            ..Self::file(name, text.into().into_bytes())
        }
    }

    /// A directory marker. A trailing `/` is added to the name if missing.
    pub fn directory(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        Self {
            name,
            is_directory: true,
            ..Self::default()
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_last_modified(mut self, time: DosDateTime) -> Self {
        self.last_modified = Some(time);
        self
    }
}

/// Settings shared by every entry of a written archive
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Data longer than this many bytes is deflated; shorter data is stored
    pub deflate_threshold: usize,
    /// Modification time of entries that do not carry their own
    pub last_modified: DosDateTime,
    /// Archive comment stored in the EOCD
    pub comment: Option<String>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            deflate_threshold: 32,
            last_modified: DosDateTime::now(),
            comment: None,
        }
    }
}

/// Incremental archive writer producing byte chunks.
#[derive(Debug)]
pub struct ZipWriter {
    options: WriterOptions,
    offset: u64,
    directory: Vec<CentralDirectoryEntry>,
}

impl ZipWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self {
            options,
            offset: 0,
            directory: Vec::new(),
        }
    }

    /// Bytes written so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Write one entry, returning its local header and data.
    pub fn add(&mut self, item: &ZipItem) -> Result<Vec<Bytes>> {
        let data = if item.is_directory { None } else { item.data.as_deref() };

        let method = match data {
            Some(data) if data.len() > self.options.deflate_threshold => CompressionMethod::Deflate,
            _ => CompressionMethod::Stored,
        };
        let crc32 = data.map_or(0, crc32);
        let compressed = match data {
            Some(data) => compress(data, method)?,
            None => Vec::new(),
        };

        let file_name = item.name.as_bytes().to_vec();
        if file_name.len() > usize::from(u16::MAX) {
            return Err(ZipError::TooLarge("entry name"));
        }
        let comment = item.comment.clone().unwrap_or_default().into_bytes();
        if comment.len() > usize::from(u16::MAX) {
            return Err(ZipError::TooLarge("entry comment"));
        }
        let compressed_size =
            u32::try_from(compressed.len()).map_err(|_| ZipError::TooLarge("compressed entry"))?;
        let uncompressed_size = u32::try_from(data.map_or(0, <[u8]>::len))
            .map_err(|_| ZipError::TooLarge("entry"))?;
        let local_header_offset =
            u32::try_from(self.offset).map_err(|_| ZipError::TooLarge("archive offset"))?;

        let header = LocalFileHeader {
            version_needed: ZIP_VERSION,
            flags: FLAG_UTF8,
            compression_method: method,
            last_modified: item.last_modified.unwrap_or(self.options.last_modified),
            crc32,
            compressed_size,
            uncompressed_size,
            file_name: file_name.clone(),
            extra: Vec::new(),
        };

        self.directory.push(CentralDirectoryEntry {
            version_made_by: ZIP_VERSION,
            version_needed: ZIP_VERSION,
            flags: header.flags,
            compression_method: method,
            last_modified: header.last_modified,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start: 0,
            internal_attributes: if item.is_text { ATTR_TEXT } else { 0 },
            external_attributes: if item.is_directory { ATTR_DIRECTORY } else { ATTR_ARCHIVE },
            local_header_offset,
            file_name,
            extra: Vec::new(),
            comment,
        });

        debug!(
            name = %item.name,
            method = method.as_u16(),
            size = uncompressed_size,
            compressed_size,
            "added entry"
        );

        let header = Bytes::from(header.encode());
        self.offset += (header.len() + compressed.len()) as u64;
        let mut out = vec![header];
        if !compressed.is_empty() {
            out.push(Bytes::from(compressed));
        }
        Ok(out)
    }

    /// Emit the Central Directory and EOCD.
    pub fn finish(self) -> Result<Bytes> {
        let cd_offset =
            u32::try_from(self.offset).map_err(|_| ZipError::TooLarge("central directory offset"))?;
        let count = u16::try_from(self.directory.len()).map_err(|_| ZipError::TooLarge("entry count"))?;

        let mut out = Vec::new();
        for record in &self.directory {
            out.extend_from_slice(&record.encode());
        }
        let cd_size = u32::try_from(out.len()).map_err(|_| ZipError::TooLarge("central directory"))?;

        let comment = self.options.comment.unwrap_or_default().into_bytes();
        if comment.len() > usize::from(u16::MAX) {
            return Err(ZipError::TooLarge("archive comment"));
        }
        let end = EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: count,
            total_entries: count,
            cd_size,
            cd_offset,
            comment,
        };
        out.extend_from_slice(&end.encode());

        info!(entries = count, cd_offset, cd_size, "wrote archive");
        Ok(Bytes::from(out))
    }
}

/// State threaded through [`create_zip`]'s pull loop
struct Pump {
    items: Pin<Box<dyn Stream<Item = ZipItem> + Send>>,
    writer: Option<ZipWriter>,
    pending: Vec<Bytes>,
}

async fn pump(mut pump: Pump) -> Result<Option<(Bytes, Pump)>> {
    loop {
        if !pump.pending.is_empty() {
            let chunk = pump.pending.remove(0);
            return Ok(Some((chunk, pump)));
        }
        let Some(writer) = pump.writer.as_mut() else {
            return Ok(None);
        };
        match pump.items.next().await {
            Some(item) => pump.pending = writer.add(&item)?,
            None => {
                if let Some(writer) = pump.writer.take() {
                    pump.pending.push(writer.finish()?);
                }
            }
        }
    }
}

/// Write an archive from a (possibly asynchronous) sequence of items.
///
/// Items are pulled one at a time as the output is consumed.
pub fn create_zip<St>(items: St, options: WriterOptions) -> impl Stream<Item = Result<Bytes>> + Send
where
    St: Stream<Item = ZipItem> + Send + 'static,
{
    let state = Pump {
        items: items.boxed(),
        writer: Some(ZipWriter::new(options)),
        pending: Vec::new(),
    };
    stream::try_unfold(state, pump)
}
