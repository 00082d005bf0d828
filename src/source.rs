//! Feed source abstraction.
//!
//! The network transport that delivers the exchange feed lives outside this
//! crate. What the book needs is a stream of decoded JSON records, and this
//! module abstracts over where that stream comes from: an in-memory vector
//! (tests, simulations) or a JSON-lines capture file (replay).
//!
//! # Implementing Custom Sources
//!
//! ```
//! use l3_lob_reconstructor::source::{FeedSource, SourceMetadata};
//! use l3_lob_reconstructor::Result;
//! use serde_json::Value;
//!
//! struct ChannelSource {
//!     records: Vec<Value>,
//!     metadata: SourceMetadata,
//! }
//!
//! impl FeedSource for ChannelSource {
//!     type RecordIter = std::vec::IntoIter<Value>;
//!
//!     fn records(self) -> Result<Self::RecordIter> {
//!         Ok(self.records.into_iter())
//!     }
//!
//!     fn metadata(&self) -> &SourceMetadata {
//!         &self.metadata
//!     }
//! }
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Source Metadata
// ============================================================================

/// Metadata about a feed source.
#[derive(Debug, Clone, Default)]
pub struct SourceMetadata {
    /// Product id (e.g., "BTC-USD")
    pub product_id: Option<String>,

    /// Capture date in YYYY-MM-DD format
    pub date: Option<String>,

    /// Original file path (if loaded from file)
    pub file_path: Option<PathBuf>,

    /// Provider name (e.g., "memory", "jsonl")
    pub provider: Option<String>,

    /// Estimated record count (for progress tracking)
    pub estimated_records: Option<u64>,

    /// File size in bytes (if applicable)
    pub file_size: Option<u64>,
}

impl SourceMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_file_path(mut self, path: impl AsRef<Path>) -> Self {
        self.file_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_estimated_records(mut self, count: u64) -> Self {
        self.estimated_records = Some(count);
        self
    }

    /// Extract metadata from a capture file path.
    ///
    /// Recognised filename patterns:
    /// - `BTC-USD_2024-03-01.jsonl` → product_id="BTC-USD", date="2024-03-01"
    /// - `BTC-USD.jsonl` → product_id="BTC-USD"
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut metadata = Self::new().with_file_path(path);

        if let Ok(meta) = std::fs::metadata(path) {
            metadata.file_size = Some(meta.len());
        }

        if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
            let base = filename
                .trim_end_matches(".jsonl")
                .trim_end_matches(".ndjson")
                .trim_end_matches(".json");

            match base.split_once('_') {
                Some((product, rest)) => {
                    metadata.product_id = Some(product.to_string());
                    let date = rest
                        .get(..10)
                        .filter(|d| d.as_bytes()[4] == b'-' && d.as_bytes()[7] == b'-');
                    metadata.date = date.map(str::to_string);
                }
                None if !base.is_empty() => metadata.product_id = Some(base.to_string()),
                None => {}
            }
        }

        metadata
    }
}

// ============================================================================
// Feed Source Trait
// ============================================================================

/// A single-pass stream of decoded feed records.
///
/// `records()` consumes the source. Records are yielded as raw JSON values;
/// typing and validation happen in the reconstructor, so a malformed record
/// still reaches it and is counted there.
pub trait FeedSource {
    /// The iterator type for records.
    type RecordIter: Iterator<Item = Value>;

    /// Consume the source and return an iterator over records.
    ///
    /// Errors only if the source cannot be opened at all.
    fn records(self) -> Result<Self::RecordIter>;

    fn metadata(&self) -> &SourceMetadata;
}

// ============================================================================
// Vector Source (for testing)
// ============================================================================

/// In-memory source.
///
/// # Example
///
/// ```
/// use l3_lob_reconstructor::source::{FeedSource, VecSource};
/// use serde_json::json;
///
/// let source = VecSource::new(vec![
///     json!({"type": "open", "order_id": "a", "side": "buy", "price": "1", "size": "1"}),
///     json!({"type": "done", "order_id": "a"}),
/// ]);
///
/// assert_eq!(source.metadata().estimated_records, Some(2));
/// assert_eq!(source.records().unwrap().count(), 2);
/// ```
pub struct VecSource {
    records: Vec<Value>,
    metadata: SourceMetadata,
}

impl VecSource {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            metadata: SourceMetadata::new()
                .with_provider("memory")
                .with_estimated_records(records.len() as u64),
            records,
        }
    }

    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl FeedSource for VecSource {
    type RecordIter = std::vec::IntoIter<Value>;

    fn records(self) -> Result<Self::RecordIter> {
        Ok(self.records.into_iter())
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }
}

// ============================================================================
// JSON Lines Source
// ============================================================================

/// One JSON record per line, read from a capture file.
///
/// Blank lines are skipped. Lines that are not valid JSON are logged and
/// skipped; a read error is logged and ends the stream.
pub struct JsonLinesSource {
    path: PathBuf,
    metadata: SourceMetadata,
}

impl JsonLinesSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let metadata = SourceMetadata::from_path(&path).with_provider("jsonl");
        Self { path, metadata }
    }

    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeedSource for JsonLinesSource {
    type RecordIter = JsonLinesIter<BufReader<File>>;

    fn records(self) -> Result<Self::RecordIter> {
        let file = File::open(&self.path)?;
        log::info!("Reading feed records from {}", self.path.display());
        Ok(JsonLinesIter::new(BufReader::new(file)))
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }
}

/// Iterator over JSON records in a line-delimited reader.
///
/// Lines are read as raw bytes. A line that is not UTF-8 or not valid JSON
/// is logged and skipped; only an I/O error from the reader ends the stream.
pub struct JsonLinesIter<R> {
    reader: R,
    buf: Vec<u8>,
    line_no: u64,
    skipped: u64,
}

impl<R: BufRead> JsonLinesIter<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(1024),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Lines skipped because they were not UTF-8 or not valid JSON.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

fn skip_line(skipped: &mut u64, line_no: u64, reason: &dyn std::fmt::Display) {
    *skipped += 1;
    log::warn!("Skipping line {}: {}", line_no, reason);
}

impl JsonLinesIter<BufReader<Box<dyn Read>>> {
    /// Wrap any reader (stdin, a decompressor, ...).
    pub fn from_reader(reader: Box<dyn Read>) -> Self {
        Self::new(BufReader::new(reader))
    }
}

impl<R: BufRead> Iterator for JsonLinesIter<R> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    log::error!("Read error after line {}: {}", self.line_no, err);
                    return None;
                }
            }
            self.line_no += 1;

            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim(),
                Err(err) => {
                    skip_line(&mut self.skipped, self.line_no, &err);
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str(line) {
                Ok(value) => return Some(value),
                Err(err) => skip_line(&mut self.skipped, self.line_no, &err),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
