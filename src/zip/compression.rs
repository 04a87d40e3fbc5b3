//! Store/deflate adapter.
//!
//! Method 8 entries hold raw deflate streams (no zlib header), so the
//! encoder and decoder are configured without one.

use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

use crate::error::{Result, ZipError};

use super::structures::CompressionMethod;

/// Compress `data` with the given method.
pub fn compress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(data.to_vec()),
        CompressionMethod::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        CompressionMethod::Unknown(m) => Err(ZipError::UnsupportedCompression(m)),
    }
}

/// Decompress `data` with the given method.
///
/// A deflate stream that ends before its final block is reported as
/// [`ZipError::DecompressionFailure`], same as one that is malformed.
pub fn decompress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(data.to_vec()),
        CompressionMethod::Deflate => inflate(data),
        CompressionMethod::Unknown(m) => Err(ZipError::UnsupportedCompression(m)),
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut inflater = Decompress::new(false);
    let mut out = Vec::with_capacity(data.len().saturating_mul(3).max(64));

    loop {
        let consumed = inflater.total_in() as usize;
        let produced = out.len();
        let status = inflater
            .decompress_vec(&data[consumed..], &mut out, FlushDecompress::Finish)
            .map_err(|e| ZipError::DecompressionFailure(e.to_string()))?;

        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                if out.len() == out.capacity() {
                    out.reserve(out.capacity());
                    continue;
                }
                let progressed =
                    inflater.total_in() as usize != consumed || out.len() != produced;
                if !progressed || inflater.total_in() as usize == data.len() {
                    return Err(ZipError::DecompressionFailure(
                        "truncated deflate stream".to_string(),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_is_identity() {
        let data = b"Hello world\n";
        assert_eq!(compress(data, CompressionMethod::Stored).unwrap(), data);
        assert_eq!(decompress(data, CompressionMethod::Stored).unwrap(), data);
    }

    #[test]
    fn deflate_shrinks_repetitive_text() {
        let data = b"Hello world\n".repeat(300);
        let packed = compress(&data, CompressionMethod::Deflate).unwrap();
        assert!(packed.len() < data.len() / 10);
        assert_eq!(decompress(&packed, CompressionMethod::Deflate).unwrap(), data);
    }

    #[test]
    fn deflate_handles_empty_input() {
        let packed = compress(b"", CompressionMethod::Deflate).unwrap();
        assert!(decompress(&packed, CompressionMethod::Deflate).unwrap().is_empty());
    }

    #[test]
    fn invalid_deflate_data_fails() {
        let result = decompress(&[0u8; 3], CompressionMethod::Deflate);
        assert!(matches!(result, Err(ZipError::DecompressionFailure(_))));
    }

    #[test]
    fn truncated_deflate_data_fails() {
        let data: Vec<u8> = (0..4000u32).map(|i| (i * 7 % 251) as u8).collect();
        let packed = compress(&data, CompressionMethod::Deflate).unwrap();
        let result = decompress(&packed[..packed.len() / 2], CompressionMethod::Deflate);
        assert!(matches!(result, Err(ZipError::DecompressionFailure(_))));
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(matches!(
            decompress(b"x", CompressionMethod::Unknown(14)),
            Err(ZipError::UnsupportedCompression(14))
        ));
    }
}
