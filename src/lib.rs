//! # rezip
//!
//! Streaming ZIP reader, rewriter and writer with HTTP Range support.
//!
//! Three ways into an archive:
//!
//! - Random access: [`ZipExtractor`] reads the Central Directory from the
//!   end of any [`ReadAt`] source (local file, memory, or a remote file via
//!   HTTP Range requests) and extracts single entries.
//! - Forward streaming: [`modify_zip`] rewrites an archive as it flows past,
//!   keeping, dropping or transforming entries chosen by a [`Selector`].
//! - Creation: [`create_zip`] and [`ZipWriter`] produce a new archive.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rezip::{HttpRangeReader, ZipExtractor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(HttpRangeReader::new("https://example.com/archive.zip".to_string()).await?);
//!
//!     let mut extractor = ZipExtractor::new(reader);
//!     extractor.open().await?;
//!     for file in extractor.list_files()? {
//!         println!("{}", file.file_name);
//!     }
//!
//!     let readme = extractor.extract_text("README.md").await?;
//!     println!("{}", readme);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod dictionary;
pub mod error;
pub mod io;
pub mod template;
pub mod zip;

pub use cli::Cli;
pub use dictionary::{Dictionary, DictionaryMeta};
pub use error::{Result, ZipError};
pub use io::{HttpOptions, HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use template::{PlaceholderSelector, is_slide_entry, substitute_placeholders};
pub use zip::{
    Replacement, Selection, Selector, WriterOptions, ZipExtractor, ZipFileEntry, ZipItem,
    ZipTransformer, ZipWriter, create_zip, modify_zip,
};
