//! Word lists stored in a ZIP archive.
//!
//! A dictionary archive holds a `meta.json` describing it and, for every
//! syllable count `n`, the sorted word list split into slices of 250 words:
//! `<n>-syllable/0.txt`, `<n>-syllable/250.txt`, and so on. Each slice is a
//! newline-joined list. Slices are fetched on first use and kept for the
//! lifetime of the open dictionary.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Result, ZipError};
use crate::io::ReadAt;
use crate::zip::ZipExtractor;

/// Words per slice file
pub const WORDS_PER_SLICE: usize = 250;

const META_FILE: &str = "meta.json";

/// Contents of `meta.json`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DictionaryMeta {
    pub locale: String,
    pub size: String,
    /// Word count keyed by `"<n>-syllable"`
    pub words: HashMap<String, usize>,
}

impl DictionaryMeta {
    pub fn word_count(&self, syllables: u32) -> usize {
        self.words
            .get(&format!("{}-syllable", syllables))
            .copied()
            .unwrap_or(0)
    }
}

pub struct Dictionary<R: ReadAt> {
    archive: ZipExtractor<R>,
    meta: Option<DictionaryMeta>,
    slices: HashMap<String, Vec<String>>,
}

impl<R: ReadAt> Dictionary<R> {
    pub fn new(archive: ZipExtractor<R>) -> Self {
        Self {
            archive,
            meta: None,
            slices: HashMap::new(),
        }
    }

    /// Open the archive and read its `meta.json`.
    pub async fn open(&mut self) -> Result<()> {
        self.archive.open().await?;
        let meta: DictionaryMeta = self.archive.extract_json(META_FILE).await?;
        debug!(locale = %meta.locale, size = %meta.size, "opened dictionary");
        self.meta = Some(meta);
        Ok(())
    }

    pub fn close(&mut self) {
        self.archive.close();
        self.meta = None;
        self.slices.clear();
    }

    pub fn meta(&self) -> Result<&DictionaryMeta> {
        self.meta.as_ref().ok_or(ZipError::NotOpened)
    }

    /// Number of words with the given number of syllables
    pub fn word_count(&self, syllables: u32) -> Result<usize> {
        Ok(self.meta()?.word_count(syllables))
    }

    /// The `index`-th word (in sorted order) with the given number of syllables.
    pub async fn word(&mut self, syllables: u32, index: usize) -> Result<String> {
        let out_of_range = ZipError::WordOutOfRange { syllables, index };
        if index >= self.word_count(syllables)? {
            return Err(out_of_range);
        }

        let offset = index % WORDS_PER_SLICE;
        let file_name = format!("{}-syllable/{}.txt", syllables, index - offset);
        if !self.slices.contains_key(&file_name) {
            let text = self.archive.extract_text(&file_name).await?;
            let words = text.split('\n').map(str::to_string).collect();
            debug!(file = %file_name, "loaded word slice");
            self.slices.insert(file_name.clone(), words);
        }

        self.slices
            .get(&file_name)
            .and_then(|words| words.get(offset))
            .filter(|word| !word.is_empty())
            .cloned()
            .ok_or(out_of_range)
    }
}
