use super::ReadAt;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Positional reads from an archive on disk.
///
/// Reads run on tokio's blocking pool. [`refresh`](ReadAt::refresh) reopens
/// the path, so an archive replaced on disk is picked up on reload.
pub struct LocalFileReader {
    path: PathBuf,
    handle: RwLock<Handle>,
}

#[derive(Clone)]
struct Handle {
    file: Arc<File>,
    size: u64,
}

impl Handle {
    fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Arc::new(file),
            size,
        })
    }
}

impl LocalFileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let handle = Handle::open(path)?;
        debug!(path = %path.display(), size = handle.size, "opened local archive");
        Ok(Self {
            path: path.to_path_buf(),
            handle: RwLock::new(handle),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    // seek_read moves the cursor, which nothing else relies on
    file.seek_read(buf, offset)
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let file = self.handle.read().file.clone();
        let len = buf.len();
        let (data, n) = tokio::task::spawn_blocking(move || {
            let mut data = vec![0u8; len];
            pread(&file, &mut data, offset).map(|n| (data, n))
        })
        .await
        .map_err(io::Error::other)??;
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.handle.read().size
    }

    async fn refresh(&self) -> Result<()> {
        let path = self.path.clone();
        let handle = tokio::task::spawn_blocking(move || Handle::open(&path))
            .await
            .map_err(io::Error::other)??;
        debug!(path = %self.path.display(), size = handle.size, "reopened local archive");
        *self.handle.write() = handle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_at_offsets() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"0123456789").unwrap();

        let reader = LocalFileReader::new(file.path()).unwrap();
        assert_eq!(reader.size(), 10);

        let mut buf = [0u8; 4];
        assert_eq!(reader.read_fully_at(3, &mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"3456");

        assert_eq!(reader.read_fully_at(8, &mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(reader.read_at(20, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn refresh_sees_a_replaced_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.zip");
        std::fs::write(&path, b"old").unwrap();

        let reader = LocalFileReader::new(&path).unwrap();
        assert_eq!(reader.size(), 3);

        // Replace rather than truncate, as an archive rewritten elsewhere would be
        let staged = dir.path().join("archive.zip.new");
        std::fs::write(&staged, b"brand new").unwrap();
        std::fs::rename(&staged, &path).unwrap();
        assert_eq!(reader.size(), 3);

        reader.refresh().await.unwrap();
        assert_eq!(reader.size(), 9);
        let mut buf = [0u8; 9];
        assert_eq!(reader.read_fully_at(0, &mut buf).await.unwrap(), 9);
        assert_eq!(&buf, b"brand new");
    }
}
