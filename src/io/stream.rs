//! Forward-only byte streams feeding the transformer and draining the writer.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::path::Path;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// A boxed stream of archive bytes
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Turn an async reader into a stream of chunks of at most `chunk_size` bytes.
pub fn reader_stream<R>(reader: R, chunk_size: usize) -> ByteStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let chunk_size = chunk_size.max(1);
    Box::pin(stream::try_unfold(reader, move |mut reader| async move {
        let mut buf = vec![0u8; chunk_size];
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), reader)))
    }))
}

/// Stream a local file.
pub async fn file_stream(path: &Path, chunk_size: usize) -> Result<ByteStream> {
    let file = tokio::fs::File::open(path).await?;
    Ok(reader_stream(file, chunk_size))
}

/// Drain a stream into memory.
pub async fn collect_stream<S>(stream: S) -> Result<Vec<u8>>
where
    S: Stream<Item = Result<Bytes>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}

/// Drain a stream into a writer, returning the number of bytes written.
pub async fn write_stream<S, W>(stream: S, writer: &mut W) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>>,
    W: AsyncWrite + Unpin,
{
    let mut stream = std::pin::pin!(stream);
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_stream_respects_chunk_size() {
        let data: &'static [u8] = b"abcdefghij";
        let chunks: Vec<Bytes> = reader_stream(data, 3)
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert!(chunks.iter().all(|c| c.len() <= 3));
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn write_stream_counts_bytes() {
        let input = stream::iter(vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cde"))]);
        let mut out = Vec::new();
        assert_eq!(write_stream(input, &mut out).await.unwrap(), 5);
        assert_eq!(out, b"abcde");
    }
}
