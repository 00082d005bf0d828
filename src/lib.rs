//! # L3-LOB-Reconstructor
//!
//! Incremental order book reconstruction from an exchange's order-level
//! (L3) JSON feed.
//!
//! The exchange delivers an unbounded stream of `open`, `done` and `match`
//! records per order. This library turns that stream into a queryable,
//! depth-limited top of book with exact aggregated quantity per price
//! level, without re-fetching full state from the exchange on every change.
//!
//! ## Features
//!
//! - **Three consistent views**: id-keyed order store, (side, price) level
//!   index, and a derived top-of-book cache
//! - **Conditional rebuilds**: the cache is recomputed only when a change can
//!   reach the visible window, one side at a time
//! - **Self-healing**: an incoming order that crosses resting opposite-side
//!   levels purges them, compensating for dropped feed events
//! - **Exact arithmetic**: prices and quantities are `rust_decimal::Decimal`
//! - **Never fails on feed data**: malformed records are logged, counted and
//!   dropped; processing continues
//!
//! ## Quick Start
//!
//! ```rust
//! use l3_lob_reconstructor::{BookConfig, BookReconstructor, SeedSnapshot, Side};
//! use rust_decimal::Decimal;
//!
//! let snapshot = SeedSnapshot::from_json(r#"{
//!     "bids": [["1000", "1", "a"], ["995", ".5", "b"], ["1010", ".4", "c"]],
//!     "asks": [["2000", "1", "x"], ["2095", ".5", "y"], ["2010", ".4", "z"]]
//! }"#).unwrap();
//!
//! let mut book = BookReconstructor::from_snapshot(BookConfig::new(5), &snapshot);
//!
//! // A buy at 2030 crosses the asks at 2000 and 2010; both levels are purged.
//! book.process_json(r#"{"type":"open","order_id":"e","side":"buy","price":"2030","size":"1.5"}"#);
//! book.process_json(r#"{"type":"done","order_id":"a"}"#);
//!
//! let top = book.top_of_book();
//! assert_eq!(top.best_bid(), Some(Decimal::from(2030)));
//! assert_eq!(top.best_ask(), Some(Decimal::from(2095)));
//! assert_eq!(top.side(Side::Sell).len(), 1);
//!
//! println!("{top}");
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Core types: `Side`, `Order`, `Level`, `TopOfBook`, `BookConsistency` |
//! | [`feed`] | Feed records: `FeedMessage`, `OpenOrder`, `OrderRemoval` |
//! | [`seed`] | Full-depth seed snapshot: `SeedSnapshot`, `SeedEntry` |
//! | [`lob`] | Reconstruction: `BookReconstructor`, `MultiProductBook`, store, index, cache, corrector |
//! | [`source`] | Feed sources: `FeedSource`, `VecSource`, `JsonLinesSource` |
//! | [`warnings`] | Warning tracking: `WarningTracker`, `Warning`, `WarningCategory` |

pub mod error;
pub mod feed;
pub mod lob;
pub mod seed;
pub mod source;
pub mod types;
pub mod warnings;

// Re-exports - Core types
pub use error::{BookError, Result};
pub use types::{BookConsistency, Level, Order, Side, TopOfBook};

// Re-exports - Feed records and seeding
pub use feed::{FeedMessage, MessageKind, OpenOrder, OrderRemoval};
pub use seed::{SeedEntry, SeedSnapshot};

// Re-exports - Book reconstruction
pub use lob::{
    BookConfig, BookReconstructor, BookStats, Correction, CrossedBookCorrector, LevelIndex,
    LevelRemoval, MultiProductBook, MultiProductStats, OrderStore, ProcessOutcome, PurgedLevel,
    TopOfBookCache, DEFAULT_DEPTH,
};

// Re-exports - Warnings
pub use warnings::{
    Warning, WarningCategory, WarningSummary, WarningTracker, WarningTrackerConfig,
};

// Re-exports - Source abstraction
pub use source::{FeedSource, JsonLinesSource, SourceMetadata, VecSource};
