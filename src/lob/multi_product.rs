//! Multi-product book manager.
//!
//! The exchange feed multiplexes every subscribed product over one stream,
//! tagging each record with `product_id`. `MultiProductBook` keeps one
//! `BookReconstructor` per tracked product and routes records to it.

use ahash::AHashMap;
use serde_json::Value;

use super::reconstructor::{BookConfig, BookReconstructor, BookStats, ProcessOutcome};
use crate::error::{BookError, Result};
use crate::seed::SeedSnapshot;
use crate::types::TopOfBook;
use crate::warnings::{WarningCategory, WarningTracker};

/// Multi-product book manager.
///
/// # Example
/// ```
/// use l3_lob_reconstructor::{BookConfig, MultiProductBook, ProcessOutcome};
/// use serde_json::json;
///
/// let mut books = MultiProductBook::new(BookConfig::new(5).with_logging(false));
/// books.add_product("BTC-USD").unwrap();
///
/// let outcome = books.process_value(&json!({
///     "type": "open", "product_id": "BTC-USD",
///     "order_id": "a", "side": "buy", "price": "100", "size": "1"
/// }));
/// assert!(matches!(outcome, ProcessOutcome::Opened { .. }));
/// assert_eq!(books.top_of_book("BTC-USD").unwrap().best_bid().unwrap().to_string(), "100");
/// ```
#[derive(Debug)]
pub struct MultiProductBook {
    /// Config applied to every product book
    config: BookConfig,

    /// product_id -> reconstructor
    books: AHashMap<String, BookReconstructor>,

    stats: MultiProductStats,

    /// Routing anomalies (untracked products, missing `product_id`)
    warnings: Option<WarningTracker>,
}

/// Statistics for multi-product routing.
#[derive(Debug, Clone, Default)]
pub struct MultiProductStats {
    /// Total products tracked
    pub product_count: usize,

    /// Records routed to a tracked product
    pub total_messages: u64,

    /// Records for products nobody tracks
    pub unrouted: u64,

    /// Records without a usable `product_id`
    pub malformed: u64,

    /// Routed records per product
    pub messages_per_product: AHashMap<String, u64>,
}

impl MultiProductBook {
    pub fn new(config: BookConfig) -> Self {
        Self {
            books: AHashMap::new(),
            stats: MultiProductStats::default(),
            warnings: config.track_warnings.then(WarningTracker::new),
            config,
        }
    }

    /// Start tracking `product_id` with an empty book.
    ///
    /// Errors if the product is already tracked.
    pub fn add_product(&mut self, product_id: impl Into<String>) -> Result<()> {
        let book = BookReconstructor::with_config(self.config.clone());
        self.insert_book(product_id.into(), book)
    }

    /// Start tracking `product_id` with a book seeded from `snapshot`.
    pub fn add_product_with_snapshot(
        &mut self,
        product_id: impl Into<String>,
        snapshot: &SeedSnapshot,
    ) -> Result<()> {
        let book = BookReconstructor::from_snapshot(self.config.clone(), snapshot);
        self.insert_book(product_id.into(), book)
    }

    fn insert_book(&mut self, product_id: String, book: BookReconstructor) -> Result<()> {
        if self.books.contains_key(&product_id) {
            return Err(BookError::generic(format!(
                "Product {} already exists",
                product_id
            )));
        }

        self.books.insert(product_id.clone(), book);
        self.stats.product_count = self.books.len();
        self.stats.messages_per_product.insert(product_id, 0);
        Ok(())
    }

    /// Stop tracking a product, returning its book.
    pub fn remove_product(&mut self, product_id: &str) -> Result<BookReconstructor> {
        let book = self
            .books
            .remove(product_id)
            .ok_or_else(|| BookError::ProductNotFound(product_id.to_string()))?;

        self.stats.product_count = self.books.len();
        self.stats.messages_per_product.remove(product_id);
        Ok(book)
    }

    /// Route a decoded record by its `product_id`.
    ///
    /// Records for untracked products are ignored; records without a
    /// string `product_id` are malformed.
    pub fn process_value(&mut self, value: &Value) -> ProcessOutcome {
        let Some(product_id) = value.get("product_id").and_then(Value::as_str) else {
            self.stats.malformed += 1;
            if self.config.log_warnings {
                log::warn!("Dropping record without product_id: {}", value);
            }
            if let Some(tracker) = self.warnings.as_mut() {
                tracker.record_simple(WarningCategory::MalformedMessage, "record without product_id");
            }
            return ProcessOutcome::Malformed;
        };

        let Some(book) = self.books.get_mut(product_id) else {
            self.stats.unrouted += 1;
            if self.config.log_warnings {
                log::debug!("Ignoring record for untracked product {}", product_id);
            }
            if let Some(tracker) = self.warnings.as_mut() {
                tracker.record_simple(
                    WarningCategory::UnknownProduct,
                    format!("record for untracked product {}", product_id),
                );
            }
            return ProcessOutcome::Ignored;
        };

        let outcome = book.process_value(value);

        self.stats.total_messages += 1;
        *self
            .stats
            .messages_per_product
            .entry(product_id.to_string())
            .or_insert(0) += 1;

        outcome
    }

    /// Route a raw JSON text record.
    pub fn process_json(&mut self, text: &str) -> ProcessOutcome {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => self.process_value(&value),
            Err(err) => {
                self.stats.malformed += 1;
                if self.config.log_warnings {
                    log::warn!("Dropping unparseable record: {}", err);
                }
                if let Some(tracker) = self.warnings.as_mut() {
                    tracker.record_simple(WarningCategory::MalformedMessage, err.to_string());
                }
                ProcessOutcome::Malformed
            }
        }
    }

    /// Top of book for one product.
    pub fn top_of_book(&self, product_id: &str) -> Result<TopOfBook> {
        Ok(self.book(product_id)?.top_of_book())
    }

    pub fn book(&self, product_id: &str) -> Result<&BookReconstructor> {
        self.books
            .get(product_id)
            .ok_or_else(|| BookError::ProductNotFound(product_id.to_string()))
    }

    pub fn book_mut(&mut self, product_id: &str) -> Result<&mut BookReconstructor> {
        self.books
            .get_mut(product_id)
            .ok_or_else(|| BookError::ProductNotFound(product_id.to_string()))
    }

    /// Reset one product's book.
    pub fn reset_product(&mut self, product_id: &str) -> Result<()> {
        self.book_mut(product_id)?.reset();
        Ok(())
    }

    /// Reset every book and the routing counters.
    pub fn reset_all(&mut self) {
        for book in self.books.values_mut() {
            book.reset();
        }

        self.stats.total_messages = 0;
        self.stats.unrouted = 0;
        self.stats.malformed = 0;
        for count in self.stats.messages_per_product.values_mut() {
            *count = 0;
        }
        if let Some(tracker) = self.warnings.as_mut() {
            tracker.clear();
        }
    }

    /// Tracked product ids (unordered).
    pub fn products(&self) -> Vec<&str> {
        self.books.keys().map(|s| s.as_str()).collect()
    }

    pub fn product_count(&self) -> usize {
        self.books.len()
    }

    pub fn has_product(&self, product_id: &str) -> bool {
        self.books.contains_key(product_id)
    }

    pub fn stats(&self) -> &MultiProductStats {
        &self.stats
    }

    /// Routing warnings, if tracking is enabled. Per-product anomalies live
    /// in each product book's own tracker.
    pub fn warnings(&self) -> Option<&WarningTracker> {
        self.warnings.as_ref()
    }

    /// Book statistics for one product.
    pub fn product_stats(&self, product_id: &str) -> Result<&BookStats> {
        Ok(self.book(product_id)?.stats())
    }
}
