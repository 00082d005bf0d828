//! Full-depth seed snapshot.
//!
//! The snapshot is fetched once at startup (by an external client) and used
//! to initialise the book before streamed updates are applied. Each side is
//! a list of `[price, size, order_id]` triples; price and size may be JSON
//! strings or numbers.
//!
//! ```
//! use l3_lob_reconstructor::seed::SeedSnapshot;
//!
//! let snapshot = SeedSnapshot::from_json(r#"{
//!     "sequence": 42,
//!     "bids": [["1000", "1", "a1b"], ["995", ".5", "b1b"]],
//!     "asks": [["2000", "1", "a1a"]]
//! }"#).unwrap();
//!
//! assert_eq!(snapshot.bids.len(), 2);
//! assert_eq!(snapshot.asks[0].order_id(), "a1a");
//! ```
//!
//! There is a known race between fetching the snapshot and the first
//! streamed event being applied: events can be missed or duplicated
//! relative to the snapshot. Feed records carry no sequencing the book
//! could gate on, so nothing here tries to close that window; the
//! crossed-book corrector is the only mitigation.

use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{deserialize_decimal, Side};

/// One resting order in the snapshot: `(price, quantity, order_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEntry(
    #[serde(deserialize_with = "deserialize_decimal")] pub Decimal,
    #[serde(deserialize_with = "deserialize_decimal")] pub Decimal,
    pub String,
);

impl SeedEntry {
    pub fn new(price: Decimal, quantity: Decimal, order_id: impl Into<String>) -> Self {
        Self(price, quantity, order_id.into())
    }

    #[inline]
    pub fn price(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn quantity(&self) -> Decimal {
        self.1
    }

    #[inline]
    pub fn order_id(&self) -> &str {
        &self.2
    }
}

/// Both sides of a full-depth snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSnapshot {
    #[serde(default)]
    pub bids: Vec<SeedEntry>,

    #[serde(default)]
    pub asks: Vec<SeedEntry>,

    /// Exchange sequence of the snapshot, when provided
    #[serde(default)]
    pub sequence: Option<u64>,
}

impl SeedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bid.
    pub fn with_bid(mut self, price: Decimal, quantity: Decimal, order_id: impl Into<String>) -> Self {
        self.bids.push(SeedEntry::new(price, quantity, order_id));
        self
    }

    /// Append an ask.
    pub fn with_ask(mut self, price: Decimal, quantity: Decimal, order_id: impl Into<String>) -> Self {
        self.asks.push(SeedEntry::new(price, quantity, order_id));
        self
    }

    /// Entries for one side (`bids` are buy, `asks` are sell).
    pub fn entries(&self, side: Side) -> &[SeedEntry] {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Total number of entries across both sides.
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Load a snapshot saved as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
