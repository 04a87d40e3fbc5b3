use std::io;
use thiserror::Error;

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, ZipError>;

/// Errors raised while reading, rewriting or writing archives.
///
/// A record that is merely not fully buffered yet is not an error: the header
/// codec reports it as [`Decode::Incomplete`](crate::zip::Decode::Incomplete).
#[derive(Debug, Error)]
pub enum ZipError {
    #[error("Archive has not been opened yet")]
    NotOpened,

    #[error("Cannot find file in archive: {0}")]
    EntryNotFound(String),

    #[error("Unable to find End of Central Directory record")]
    EocdNotFound,

    #[error("Invalid Central Directory record")]
    CorruptCentralDirectory,

    #[error("Invalid Local File Header")]
    CorruptLocalHeader,

    #[error("Invalid Data Descriptor")]
    CorruptDataDescriptor,

    #[error("Invalid End of Central Directory record")]
    CorruptEndOfCentralDirectory,

    #[error("Cannot read the correct number of bytes: expected {expected}, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Decompression failed: {0}")]
    DecompressionFailure(String),

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("Unknown signature {0:08x}")]
    UnknownSignature(u32),

    #[error("Size mismatch: expected {expected} bytes, received {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Remote resource changed between reads")]
    PreconditionFailed,

    #[error("Archive stream ended in the middle of a record")]
    TruncatedStream,

    #[error("{0} does not fit in a non-ZIP64 archive")]
    TooLarge(&'static str),

    #[error("Entry is not valid UTF-8: {0}")]
    InvalidText(String),

    #[error("No word {index} among {syllables}-syllable words")]
    WordOutOfRange { syllables: u32, index: usize },

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("HTTP request failed with status: {0}")]
    HttpStatus(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
