//! ZIP archive reading, rewriting and writing.
//!
//! ## Architecture
//!
//! - [`crc`] and [`compression`]: CRC-32 and store/deflate codecs
//! - [`structures`]: Fixed-layout records (local header, data descriptor,
//!   central directory entry, EOCD) and their byte codecs
//! - [`parser`] and [`extractor`]: Random-access reading through [`ReadAt`](crate::io::ReadAt)
//! - [`transform`]: Forward-streaming rewrite of an archive
//! - [`writer`]: Archive creation from a sequence of items
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The reader starts from the EOCD, which allows listing files without
//! reading the entire archive. The transformer walks the archive front to
//! back and never seeks.
//!
//! ## Limitations
//!
//! - No ZIP64, encryption or multi-disk archives
//! - Only STORED and DEFLATE compression

pub mod compression;
pub mod crc;
mod extractor;
mod parser;
pub mod structures;
mod transform;
mod writer;

pub use crate::error::{Result, ZipError};
pub use compression::{compress, decompress};
pub use crc::{crc32, crc32_update};
pub use extractor::ZipExtractor;
pub use parser::{ZipParser, parse_central_directory, scan_for_eocd};
pub use structures::*;
pub use transform::{
    PassthroughAll, Replacement, Selection, Selector, TransformFn, ZipTransformer, modify_zip,
};
pub use writer::{WriterOptions, ZipItem, ZipWriter, create_zip};
