use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::compression::decompress;
use super::parser::ZipParser;
use super::structures::ZipFileEntry;

/// Attempts made when the source changes underneath an extraction.
const MAX_ATTEMPTS: u32 = 3;

/// Random-access ZIP reader.
///
/// The Central Directory is loaded by [`open`](Self::open) and cached until
/// [`close`](Self::close); every other operation fails with
/// [`ZipError::NotOpened`] outside that window.
pub struct ZipExtractor<R: ReadAt> {
    parser: Option<ZipParser<R>>,
    directory: Option<Vec<ZipFileEntry>>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: Some(ZipParser::new(reader)),
            directory: None,
        }
    }

    /// Locate the EOCD and load the Central Directory.
    pub async fn open(&mut self) -> Result<()> {
        let entries = self.parser()?.list_files().await?;
        debug!(entries = entries.len(), "loaded central directory");
        self.directory = Some(entries);
        Ok(())
    }

    /// Release the source and forget the Central Directory.
    pub fn close(&mut self) {
        self.directory = None;
        self.parser = None;
    }

    pub fn is_open(&self) -> bool {
        self.directory.is_some()
    }

    /// List all files in the archive
    pub fn list_files(&self) -> Result<&[ZipFileEntry]> {
        self.directory.as_deref().ok_or(ZipError::NotOpened)
    }

    pub fn find(&self, name: &str) -> Result<&ZipFileEntry> {
        self.list_files()?
            .iter()
            .find(|e| e.file_name == name)
            .ok_or_else(|| ZipError::EntryNotFound(name.to_string()))
    }

    /// Extract and decompress the named entry.
    ///
    /// If the source reports that it changed since the directory was read,
    /// the directory is reloaded and the extraction retried.
    pub async fn extract_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut attempt = 1;
        loop {
            let result = if attempt == 1 {
                self.retrieve(name).await
            } else {
                self.reload_and_retrieve(name).await
            };
            match result {
                Err(ZipError::PreconditionFailed) if attempt < MAX_ATTEMPTS => {
                    warn!(
                        "Archive changed while extracting {}, reloading ({}/{})",
                        name, attempt, MAX_ATTEMPTS
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn reload_and_retrieve(&mut self, name: &str) -> Result<Vec<u8>> {
        self.directory = None;
        self.parser()?.reader().refresh().await?;
        self.open().await?;
        self.retrieve(name).await
    }

    async fn retrieve(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.find(name)?;
        let data = self.parser()?.read_raw_data(entry).await?;
        decompress(&data, entry.compression_method)
    }

    /// Extract an entry as UTF-8 text
    pub async fn extract_text(&mut self, name: &str) -> Result<String> {
        let data = self.extract_entry(name).await?;
        String::from_utf8(data).map_err(|_| ZipError::InvalidText(name.to_string()))
    }

    /// Extract an entry and parse it as JSON
    pub async fn extract_json<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        let data = self.extract_entry(name).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Extract file to disk
    pub async fn extract_to_file(&mut self, name: &str, output_path: &Path) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let data = self.extract_entry(name).await?;

        let mut file = fs::File::create(output_path).await?;
        file.write_all(&data).await?;

        Ok(())
    }

    /// Extract file to stdout
    pub async fn extract_to_stdout(&mut self, name: &str) -> Result<()> {
        let data = self.extract_entry(name).await?;

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&data).await?;

        Ok(())
    }

    fn parser(&self) -> Result<&ZipParser<R>> {
        self.parser.as_ref().ok_or(ZipError::NotOpened)
    }
}
