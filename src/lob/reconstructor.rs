//! Single-product book reconstructor.
//!
//! Ties the order store, level index, crossed-book corrector and top-of-book
//! cache together and routes feed records to them:
//!
//! - `open`: correct crossed levels, insert, rebuild the order's side if the
//!   visible window can change
//! - `done` / `match`: remove, rebuild the order's side if its price was cached
//! - anything else: ignored
//!
//! Nothing escapes `process_*` as an error. Malformed records are logged,
//! recorded in the warning tracker (when enabled), counted, and dropped.

use rust_decimal::Decimal;
use serde_json::Value;

use super::corrector::{Correction, CrossedBookCorrector};
use super::level_index::LevelIndex;
use super::order_store::OrderStore;
use super::top_of_book::{TopOfBookCache, DEFAULT_DEPTH};
use crate::error::BookError;
use crate::feed::{FeedMessage, OpenOrder};
use crate::seed::SeedSnapshot;
use crate::types::{BookConsistency, Level, Order, Side, TopOfBook};
use crate::warnings::{Warning, WarningCategory, WarningTracker};

/// Configuration for reconstructor behavior.
#[derive(Debug, Clone)]
pub struct BookConfig {
    /// Number of price levels cached per side
    pub depth: usize,

    /// Whether to log anomalies through the `log` facade
    pub log_warnings: bool,

    /// Whether to record anomalies in a `WarningTracker`
    pub track_warnings: bool,

    /// Whether to drop price buckets emptied by removals
    pub prune_empty_levels: bool,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            log_warnings: true,
            track_warnings: false,
            prune_empty_levels: true,
        }
    }
}

impl BookConfig {
    /// Create a new config with the specified cache depth.
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            ..Default::default()
        }
    }

    /// Enable/disable warning logs.
    pub fn with_logging(mut self, log: bool) -> Self {
        self.log_warnings = log;
        self
    }

    /// Enable/disable the warning tracker.
    pub fn with_warning_tracking(mut self, track: bool) -> Self {
        self.track_warnings = track;
        self
    }

    /// Enable/disable pruning of emptied price buckets.
    pub fn with_level_pruning(mut self, prune: bool) -> Self {
        self.prune_empty_levels = prune;
        self
    }
}

/// Statistics for monitoring book health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookStats {
    /// Total records processed, malformed ones included
    pub messages_processed: u64,

    /// `open` records applied
    pub opens: u64,

    /// `done`/`match` records that removed a live order
    pub removals: u64,

    /// Records with a type irrelevant to the book
    pub ignored: u64,

    /// Records dropped as malformed
    pub malformed: u64,

    /// `done`/`match` records for ids not in the book
    pub missing_orders: u64,

    /// `open` records that replaced a live order with the same id
    pub replaced_orders: u64,

    /// Incoming orders that triggered a crossed-book purge
    pub crossed_purges: u64,

    /// Orders removed by crossed-book purges
    pub purged_orders: u64,

    /// Side rebuilds of the top-of-book cache
    pub rebuilds: u64,

    /// Number of live orders
    pub active_orders: usize,

    /// Number of non-empty buy price levels
    pub buy_levels: usize,

    /// Number of non-empty sell price levels
    pub sell_levels: usize,
}

/// What processing a single record did to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Order inserted; `purged` orders removed by the corrector first
    Opened { rebuilt: bool, purged: usize },
    /// Live order removed
    Removed { rebuilt: bool },
    /// Removal for an id not in the book
    NotFound,
    /// Record type irrelevant to the book
    Ignored,
    /// Record dropped, book unchanged
    Malformed,
}

impl ProcessOutcome {
    /// True if any side of the cache was rebuilt.
    #[inline]
    pub fn rebuilt(&self) -> bool {
        matches!(
            self,
            ProcessOutcome::Opened { rebuilt: true, .. } | ProcessOutcome::Removed { rebuilt: true }
        )
    }

    #[inline]
    pub fn is_malformed(&self) -> bool {
        matches!(self, ProcessOutcome::Malformed)
    }
}

/// Which cache sides need a rebuild after one record.
#[derive(Debug, Clone, Copy, Default)]
struct Dirty {
    buy: bool,
    sell: bool,
}

impl Dirty {
    fn mark(&mut self, side: Side) {
        match side {
            Side::Buy => self.buy = true,
            Side::Sell => self.sell = true,
        }
    }

    fn any(&self) -> bool {
        self.buy || self.sell
    }
}

/// Single-product order book reconstructor.
///
/// Owns the three views of the book and keeps them consistent:
/// every id in the level index exists in the order store at the same side
/// and price, and every cached level is the exact sum of the orders indexed
/// at it as of the side's last rebuild.
#[derive(Debug)]
pub struct BookReconstructor {
    config: BookConfig,
    store: OrderStore,
    index: LevelIndex,
    cache: TopOfBookCache,
    corrector: CrossedBookCorrector,
    stats: BookStats,
    warnings: Option<WarningTracker>,
}

impl Default for BookReconstructor {
    fn default() -> Self {
        Self::with_config(BookConfig::default())
    }
}

impl BookReconstructor {
    /// Create a reconstructor caching `depth` levels per side.
    ///
    /// # Example
    /// ```
    /// use l3_lob_reconstructor::BookReconstructor;
    ///
    /// let book = BookReconstructor::new(5);
    /// assert!(book.top_of_book().is_empty());
    /// ```
    pub fn new(depth: usize) -> Self {
        Self::with_config(BookConfig::new(depth))
    }

    /// Create a reconstructor with custom configuration.
    ///
    /// # Example
    /// ```
    /// use l3_lob_reconstructor::{BookConfig, BookReconstructor};
    ///
    /// let config = BookConfig::new(10).with_logging(false).with_warning_tracking(true);
    /// let book = BookReconstructor::with_config(config);
    /// assert!(book.warnings().is_some());
    /// ```
    pub fn with_config(config: BookConfig) -> Self {
        let warnings = config.track_warnings.then(WarningTracker::new);
        Self {
            cache: TopOfBookCache::new(config.depth),
            config,
            store: OrderStore::new(),
            index: LevelIndex::new(),
            corrector: CrossedBookCorrector::new(),
            stats: BookStats::default(),
            warnings,
        }
    }

    /// Create a reconstructor seeded from a full-depth snapshot.
    ///
    /// # Example
    /// ```
    /// use l3_lob_reconstructor::{BookConfig, BookReconstructor, SeedSnapshot};
    ///
    /// let snapshot = SeedSnapshot::from_json(
    ///     r#"{"bids": [["1000", "1", "a"]], "asks": [["2000", "1", "x"]]}"#,
    /// ).unwrap();
    /// let book = BookReconstructor::from_snapshot(BookConfig::default(), &snapshot);
    /// assert_eq!(book.order_count(), 2);
    /// ```
    pub fn from_snapshot(config: BookConfig, snapshot: &SeedSnapshot) -> Self {
        let mut book = Self::with_config(config);
        book.load_snapshot(snapshot);
        book
    }

    #[inline]
    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.config.depth
    }

    /// Replace all state with the contents of `snapshot`.
    ///
    /// Entries are inserted directly, without crossed-book correction; the
    /// snapshot is taken as internally consistent. Entries with a
    /// non-positive price or size are skipped. Both cache sides are rebuilt
    /// once at the end. Returns the number of orders loaded.
    pub fn load_snapshot(&mut self, snapshot: &SeedSnapshot) -> usize {
        self.reset();

        let mut loaded = 0;
        for side in Side::ALL {
            for entry in snapshot.entries(side) {
                let order = match Order::try_new(side, entry.price(), entry.quantity()) {
                    Ok(order) => order,
                    Err(err) => {
                        if self.config.log_warnings {
                            log::warn!("Skipping seed entry {}: {}", entry.order_id(), err);
                        }
                        self.record_warning(|id| {
                            Warning::new(id, WarningCategory::InvalidSeedEntry, err.to_string())
                                .with_order_id(entry.order_id())
                                .with_price(entry.price())
                        });
                        continue;
                    }
                };
                if let Some(previous) = self.store.put(entry.order_id(), order) {
                    self.index
                        .remove(previous.side(), previous.price(), entry.order_id());
                    self.prune_if_empty(previous.side(), previous.price());
                }
                self.index.add(side, order.price(), entry.order_id());
                loaded += 1;
            }
        }

        for side in Side::ALL {
            self.rebuild_side(side);
        }
        self.refresh_stats();

        if self.config.log_warnings {
            log::info!(
                "Seeded book with {} orders ({} bids, {} asks, sequence {:?})",
                loaded,
                self.index.level_count(Side::Buy),
                self.index.level_count(Side::Sell),
                snapshot.sequence
            );
        }
        loaded
    }

    /// Apply a raw JSON text record.
    pub fn process_json(&mut self, text: &str) -> ProcessOutcome {
        match FeedMessage::from_json(text) {
            Ok(msg) => self.process_message(&msg),
            Err(err) => self.malformed(err),
        }
    }

    /// Apply a decoded JSON record.
    pub fn process_value(&mut self, value: &Value) -> ProcessOutcome {
        match FeedMessage::from_value(value) {
            Ok(msg) => self.process_message(&msg),
            Err(err) => self.malformed(err),
        }
    }

    /// Apply a parsed feed record.
    ///
    /// This is the main entry point for book updates. The match over the
    /// variant is the dispatch table: `open` goes to the insert path,
    /// `done` and `match` share the removal path, everything else is
    /// ignored.
    pub fn process_message(&mut self, msg: &FeedMessage) -> ProcessOutcome {
        // Opens built in code bypass the parser's price/size checks.
        if let FeedMessage::Open(open) = msg {
            if let Err(err) = open.order.validate() {
                return self.malformed(err);
            }
        }

        self.stats.messages_processed += 1;

        let outcome = match msg {
            FeedMessage::Open(open) => self.open_order(open),
            FeedMessage::Done(removal) | FeedMessage::Match(removal) => {
                self.remove_order(&removal.order_id)
            }
            FeedMessage::Ignored(tag) => {
                if self.config.log_warnings {
                    log::debug!("Ignoring message type {}", tag);
                }
                self.stats.ignored += 1;
                ProcessOutcome::Ignored
            }
        };

        self.refresh_stats();
        outcome
    }

    /// Insert path.
    fn open_order(&mut self, open: &OpenOrder) -> ProcessOutcome {
        let order = open.order;
        let side = order.side();
        let mut dirty = Dirty::default();

        // Correction sees the book as it was before this order.
        let correction = self.corrector.correct(&order, &mut self.store, &mut self.index);
        let purged = correction.purged_orders();
        if !correction.is_empty() {
            self.on_correction(&open.order_id, &order, &correction);
            if correction
                .purged_prices()
                .any(|price| self.cache.contains_price(correction.side, price))
            {
                dirty.mark(correction.side);
            }
        }

        if let Some(previous) = self.store.remove(&open.order_id) {
            self.stats.replaced_orders += 1;
            if self.config.log_warnings {
                log::debug!(
                    "Order {} reopened: {} {} @ {} replaces {} {} @ {}",
                    open.order_id,
                    side,
                    order.quantity(),
                    order.price(),
                    previous.side(),
                    previous.quantity(),
                    previous.price()
                );
            }
            self.record_warning(|id| {
                Warning::new(id, WarningCategory::DuplicateOrder, "open for a live order id")
                    .with_order_id(open.order_id.as_str())
                    .with_price(previous.price())
            });
            self.index
                .remove(previous.side(), previous.price(), &open.order_id);
            self.prune_if_empty(previous.side(), previous.price());
            if self.cache.removal_affects(previous.side(), previous.price()) {
                dirty.mark(previous.side());
            }
        }

        if self.cache.insertion_affects(side, order.price()) {
            dirty.mark(side);
        }
        self.store.put(open.order_id.as_str(), order);
        self.index.add(side, order.price(), open.order_id.as_str());
        self.stats.opens += 1;

        let rebuilt = self.apply_rebuilds(dirty);
        ProcessOutcome::Opened { rebuilt, purged }
    }

    /// Removal path shared by `done` and `match`.
    fn remove_order(&mut self, order_id: &str) -> ProcessOutcome {
        let Some(order) = self.store.remove(order_id) else {
            // Already removed, or placed before the seed snapshot.
            if self.config.log_warnings {
                log::debug!("Removal for unknown order {}", order_id);
            }
            self.stats.missing_orders += 1;
            return ProcessOutcome::NotFound;
        };

        let side = order.side();
        let price = order.price();
        let removal = self.index.remove(side, price, order_id);
        debug_assert!(
            removal.removed(),
            "order {order_id} stored but not indexed at {side} {price}"
        );
        self.prune_if_empty(side, price);
        self.stats.removals += 1;

        let mut dirty = Dirty::default();
        if self.cache.removal_affects(side, price) {
            dirty.mark(side);
        }
        let rebuilt = self.apply_rebuilds(dirty);
        ProcessOutcome::Removed { rebuilt }
    }

    fn on_correction(&mut self, order_id: &str, incoming: &Order, correction: &Correction) {
        self.stats.crossed_purges += 1;
        self.stats.purged_orders += correction.purged_orders() as u64;

        let prices = correction
            .purged_prices()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        if self.config.log_warnings {
            log::warn!(
                "Crossed book: {} {} @ {} purged {} {} orders at [{}] (qty {}, message #{})",
                incoming.side(),
                order_id,
                incoming.price(),
                correction.purged_orders(),
                correction.side,
                prices,
                correction.purged_quantity(),
                self.stats.messages_processed
            );
        }

        let sequence = self.stats.messages_processed;
        let purged_levels = correction.levels.len();
        let purged_quantity = correction.purged_quantity();
        self.record_warning(|id| {
            Warning::new(
                id,
                WarningCategory::CrossedBook,
                format!("{} {} crossed {} levels", incoming.side(), order_id, correction.side),
            )
            .with_order_id(order_id)
            .with_price(incoming.price())
            .with_sequence(sequence)
            .with_context("purged_prices", prices.clone())
            .with_context("purged_levels", purged_levels.to_string())
            .with_context("purged_quantity", purged_quantity.to_string())
        });
    }

    fn malformed(&mut self, err: BookError) -> ProcessOutcome {
        self.stats.messages_processed += 1;
        self.stats.malformed += 1;

        if self.config.log_warnings {
            log::warn!(
                "Dropping malformed message #{}: {}",
                self.stats.messages_processed,
                err
            );
        }

        let category = match err {
            BookError::MissingField { .. } => WarningCategory::MissingField,
            BookError::InvalidField { .. }
            | BookError::InvalidSide(_)
            | BookError::InvalidPrice(_)
            | BookError::InvalidQuantity(_) => WarningCategory::InvalidValue,
            _ => WarningCategory::MalformedMessage,
        };
        let sequence = self.stats.messages_processed;
        self.record_warning(|id| Warning::new(id, category, err.to_string()).with_sequence(sequence));

        ProcessOutcome::Malformed
    }

    fn record_warning(&mut self, build: impl FnOnce(u64) -> Warning) {
        if let Some(tracker) = self.warnings.as_mut() {
            let id = tracker.next_id();
            tracker.record(build(id));
        }
    }

    fn prune_if_empty(&mut self, side: Side, price: Decimal) {
        if self.config.prune_empty_levels {
            self.index.prune(side, price);
        }
    }

    fn apply_rebuilds(&mut self, dirty: Dirty) -> bool {
        if dirty.buy {
            self.rebuild_side(Side::Buy);
        }
        if dirty.sell {
            self.rebuild_side(Side::Sell);
        }
        dirty.any()
    }

    fn rebuild_side(&mut self, side: Side) {
        self.cache.rebuild_side(side, &self.store, &self.index);
        self.stats.rebuilds += 1;
    }

    fn refresh_stats(&mut self) {
        self.stats.active_orders = self.store.len();
        self.stats.buy_levels = self.index.level_count(Side::Buy);
        self.stats.sell_levels = self.index.level_count(Side::Sell);
    }

    /// Force a rebuild of both cache sides.
    pub fn rebuild(&mut self) {
        for side in Side::ALL {
            self.rebuild_side(side);
        }
    }

    /// Owned copy of the cached top of book.
    ///
    /// Safe to hand to another thread; later updates never show through it.
    pub fn top_of_book(&self) -> TopOfBook {
        self.cache.snapshot()
    }

    /// Cached levels for one side, most competitive first.
    #[inline]
    pub fn levels(&self, side: Side) -> &[Level] {
        self.cache.levels(side)
    }

    #[inline]
    pub fn cache(&self) -> &TopOfBookCache {
        &self.cache
    }

    #[inline]
    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    #[inline]
    pub fn index(&self) -> &LevelIndex {
        &self.index
    }

    /// Look up a live order.
    #[inline]
    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.store.get(order_id)
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.store.len()
    }

    /// Consistency of the full book (not just the cached window).
    pub fn consistency(&self) -> BookConsistency {
        let bid = self.index.best_prices(Side::Buy, 1).first().copied();
        let ask = self.index.best_prices(Side::Sell, 1).first().copied();
        match (bid, ask) {
            (Some(bid), Some(ask)) if bid < ask => BookConsistency::Valid,
            (Some(bid), Some(ask)) if bid == ask => BookConsistency::Locked,
            (Some(_), Some(_)) => BookConsistency::Crossed,
            _ => BookConsistency::Empty,
        }
    }

    #[inline]
    pub fn stats(&self) -> &BookStats {
        &self.stats
    }

    /// Warning tracker, if enabled in the config.
    #[inline]
    pub fn warnings(&self) -> Option<&WarningTracker> {
        self.warnings.as_ref()
    }

    /// Clear all orders, levels, cached levels and statistics.
    pub fn reset(&mut self) {
        self.store.clear();
        self.index.clear();
        self.cache.clear();
        self.stats = BookStats::default();
        if let Some(tracker) = self.warnings.as_mut() {
            tracker.clear();
        }
    }
}
