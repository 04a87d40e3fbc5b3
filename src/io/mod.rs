mod http;
mod local;
mod memory;
mod stream;

pub use http::{HttpOptions, HttpRangeReader};
pub use local::LocalFileReader;
pub use memory::MemoryReader;
pub use stream::{ByteStream, collect_stream, file_stream, reader_stream, write_stream};

use crate::error::Result;
use async_trait::async_trait;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Drop any cached view of the source (validators, size) so later reads
    /// observe its current state. Sources that cannot change do nothing.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    /// Read until `buf` is full or the source is exhausted, returning the
    /// number of bytes read.
    async fn read_fully_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut read = 0;
        while read < buf.len() {
            let n = self.read_at(offset + read as u64, &mut buf[read..]).await?;
            if n == 0 {
                break;
            }
            read += n;
        }
        Ok(read)
    }
}
