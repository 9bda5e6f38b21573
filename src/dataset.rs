//! Dataset assembly and export
//!
//! Aggregates per-unit records into an ordered dataset and serializes it in
//! one of two interchangeable formats: a single pretty-printed JSON document
//! or line-delimited JSON with a tokenized representation per record.
//! Insertion order is the dataset's canonical order; both exports preserve
//! it exactly, so re-running an export over the same input is byte-stable.

use crate::{Error, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Persisted dataset formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    /// One ordered JSON array of entries
    Json,
    /// One tokenized JSON object per line
    JsonlTokenized,
}

/// One record of the training corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub audio_path: String,
    pub text: String,
    pub filename: String,
    /// Duration in seconds
    pub duration: f64,
    pub sample_rate: u32,
}

/// Provenance carried on each tokenized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub audio_path: String,
    pub filename: String,
    pub duration: f64,
}

/// One line of the tokenized JSONL export. `tokens` is omitted when the
/// tokenizer failed for this record; the line itself is still written so
/// input order and output lines stay one-to-one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizedRecord {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<u32>>,
    pub metadata: RecordMetadata,
}

/// External tokenizer collaborator: text plus a maximum length to an integer
/// token sequence. Implementations truncate, never pad, and must define
/// their own unknown-token fallback.
pub trait Tokenizer {
    fn encode(&self, text: &str, max_len: usize) -> Result<Vec<u32>>;
}

/// Trivial byte-level tokenizer: each UTF-8 byte becomes its own token id.
/// Deterministic and vocabulary-free, which makes it the default stand-in
/// when no external tokenizer service is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteTokenizer;

impl Tokenizer for ByteTokenizer {
    fn encode(&self, text: &str, max_len: usize) -> Result<Vec<u32>> {
        Ok(text.bytes().take(max_len).map(u32::from).collect())
    }
}

/// An ordered sequence of dataset entries.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    entries: Vec<DatasetEntry>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<DatasetEntry>) -> Self {
        Self { entries }
    }

    /// Append an entry, preserving insertion order.
    pub fn push(&mut self, entry: DatasetEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    /// Write the full ordered entry sequence as one JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Persistence` if the destination cannot be created and
    /// a JSON error if serialization fails.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| Error::Persistence(format!("{}: {e}", path.display())))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.entries)?;
        writer.flush()?;
        info!(
            "Wrote dataset with {} entries: {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }

    /// Reload a JSON dataset written by [`Dataset::write_json`].
    ///
    /// # Errors
    ///
    /// Returns `Error::SourceUnavailable` if the file cannot be opened and a
    /// JSON error if it does not parse as an entry array.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::SourceUnavailable(format!("{}: {e}", path.display())))?;
        let entries: Vec<DatasetEntry> = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self { entries })
    }

    /// Write one tokenized record per entry, in entry order, to a JSONL
    /// destination. Token sequences are truncated to `max_len`. A failing
    /// tokenizer call is logged and counted; its record is still written
    /// without a `tokens` field.
    ///
    /// # Returns
    ///
    /// The number of entries whose tokenization was skipped.
    ///
    /// # Errors
    ///
    /// Fails only if the destination cannot be created or written.
    pub fn write_jsonl_tokenized<P: AsRef<Path>>(
        &self,
        path: P,
        tokenizer: &dyn Tokenizer,
        max_len: usize,
    ) -> Result<usize> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| Error::Persistence(format!("{}: {e}", path.display())))?;
        let mut writer = BufWriter::new(file);
        let mut skipped = 0usize;

        for entry in &self.entries {
            let tokens = match tokenizer.encode(&entry.text, max_len) {
                Ok(tokens) => Some(tokens),
                Err(e) => {
                    warn!("Tokenization skipped for {}: {}", entry.filename, e);
                    skipped += 1;
                    None
                }
            };
            let record = TokenizedRecord {
                text: entry.text.clone(),
                tokens,
                metadata: RecordMetadata {
                    audio_path: entry.audio_path.clone(),
                    filename: entry.filename.clone(),
                    duration: entry.duration,
                },
            };
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
        }

        writer.flush()?;
        info!(
            "Wrote tokenized dataset with {} lines ({} tokenizer skips): {}",
            self.entries.len(),
            skipped,
            path.display()
        );
        Ok(skipped)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a DatasetEntry;
    type IntoIter = std::slice::Iter<'a, DatasetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
