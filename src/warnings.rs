//! Anomaly tracking for feed processing.
//!
//! The reconstructor absorbs every anomaly locally: malformed records are
//! dropped, crossed levels are purged, bad seed entries are skipped. None of
//! that is fatal, but all of it is worth knowing about when a reconstructed
//! book disagrees with the exchange. `WarningTracker` keeps a categorized,
//! deduplicated record that can be summarised or exported as JSON.
//!
//! # Example
//!
//! ```
//! use l3_lob_reconstructor::warnings::{WarningCategory, WarningTracker};
//!
//! let mut tracker = WarningTracker::new();
//! tracker.record_simple(WarningCategory::MalformedMessage, "record has no type");
//!
//! let summary = tracker.summary();
//! assert_eq!(summary.total, 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufWriter, Write};
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Category of warning for classification and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningCategory {
    /// Record without a `type`, or not valid JSON
    MalformedMessage,

    /// Record of a known type missing a required field
    MissingField,

    /// Field present but unusable (bad side, non-positive price or size)
    InvalidValue,

    /// `open` for an id that is already live
    DuplicateOrder,

    /// Incoming order crossed resting levels which were purged
    CrossedBook,

    /// Seed snapshot entry that could not be loaded
    InvalidSeedEntry,

    /// Record for a product nobody is tracking
    UnknownProduct,

    /// Other/uncategorized warning
    Other,
}

impl WarningCategory {
    /// Get a human-readable name for the category.
    pub fn name(&self) -> &'static str {
        match self {
            WarningCategory::MalformedMessage => "MALFORMED_MESSAGE",
            WarningCategory::MissingField => "MISSING_FIELD",
            WarningCategory::InvalidValue => "INVALID_VALUE",
            WarningCategory::DuplicateOrder => "DUPLICATE_ORDER",
            WarningCategory::CrossedBook => "CROSSED_BOOK",
            WarningCategory::InvalidSeedEntry => "INVALID_SEED_ENTRY",
            WarningCategory::UnknownProduct => "UNKNOWN_PRODUCT",
            WarningCategory::Other => "OTHER",
        }
    }

    /// Get severity level (1=low, 2=medium, 3=high).
    pub fn severity(&self) -> u8 {
        match self {
            WarningCategory::MalformedMessage => 2,
            WarningCategory::MissingField => 2,
            WarningCategory::InvalidValue => 2,
            WarningCategory::DuplicateOrder => 1,
            WarningCategory::CrossedBook => 3,
            WarningCategory::InvalidSeedEntry => 2,
            WarningCategory::UnknownProduct => 1,
            WarningCategory::Other => 1,
        }
    }
}

/// A single warning record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    /// Unique warning ID (auto-incremented)
    pub id: u64,

    pub category: WarningCategory,

    /// Human-readable message
    pub message: String,

    /// Wall clock time when warning was recorded (nanoseconds since epoch)
    pub recorded_at: u64,

    /// Related order id (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    /// Related price (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// Sequence number of the message being processed (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,

    /// Additional context as key-value pairs
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub context: HashMap<String, String>,
}

impl Warning {
    /// Create a new warning with minimal information.
    pub fn new(id: u64, category: WarningCategory, message: impl Into<String>) -> Self {
        Self {
            id,
            category,
            message: message.into(),
            recorded_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0),
            order_id: None,
            price: None,
            sequence: None,
            context: HashMap::new(),
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Add context key-value pair.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Summary statistics for warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarningSummary {
    /// Total number of warnings (deduplicated ones excluded)
    pub total: u64,

    /// Count by category name
    pub by_category: HashMap<String, u64>,

    /// Count by severity
    pub by_severity: HashMap<u8, u64>,

    /// Number of unique order ids involved
    pub unique_orders: u64,
}

/// Configuration for warning tracker.
#[derive(Debug, Clone)]
pub struct WarningTrackerConfig {
    /// Maximum number of warnings to keep in memory
    pub max_warnings: usize,

    /// Whether to emit recorded warnings through the `log` facade
    pub log_warnings: bool,

    /// Minimum severity to log (1=all, 2=medium+, 3=high only)
    pub min_log_severity: u8,

    /// Whether to deduplicate identical messages within a window
    pub deduplicate: bool,

    /// Time window for deduplication (nanoseconds)
    pub dedupe_window_ns: u64,
}

impl Default for WarningTrackerConfig {
    fn default() -> Self {
        Self {
            max_warnings: 100_000,
            log_warnings: false,
            min_log_severity: 2,
            deduplicate: true,
            dedupe_window_ns: 1_000_000_000, // 1 second
        }
    }
}

/// Categorized, deduplicated warning store.
#[derive(Debug)]
pub struct WarningTracker {
    config: WarningTrackerConfig,

    /// Stored warnings, capped at `max_warnings`
    warnings: Vec<Warning>,

    next_id: u64,

    /// Count by category (kept even past the storage cap)
    category_counts: HashMap<WarningCategory, u64>,

    /// Recent warnings for deduplication (category -> (message_hash, recorded_at))
    recent: HashMap<WarningCategory, Vec<(u64, u64)>>,

    unique_orders: HashSet<String>,
}

impl WarningTracker {
    /// Create a new warning tracker with default configuration.
    pub fn new() -> Self {
        Self::with_config(WarningTrackerConfig::default())
    }

    pub fn with_config(config: WarningTrackerConfig) -> Self {
        Self {
            config,
            warnings: Vec::new(),
            next_id: 1,
            category_counts: HashMap::new(),
            recent: HashMap::new(),
            unique_orders: HashSet::new(),
        }
    }

    /// Allocate the next warning id.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Record a warning.
    ///
    /// Returns the warning ID if recorded, or None if deduplicated.
    pub fn record(&mut self, warning: Warning) -> Option<u64> {
        if self.config.deduplicate {
            let msg_hash = hash_message(&warning.message);
            let now = warning.recorded_at;
            let window = self.config.dedupe_window_ns;

            let recent = self.recent.entry(warning.category).or_default();
            recent.retain(|(_, ts)| now.saturating_sub(*ts) < window);
            if recent.iter().any(|(h, _)| *h == msg_hash) {
                return None;
            }
            recent.push((msg_hash, now));
        }

        if self.config.log_warnings && warning.category.severity() >= self.config.min_log_severity
        {
            log::warn!(
                "[{}] {}: {}",
                warning.category.name(),
                warning.id,
                warning.message
            );
        }

        if let Some(order_id) = &warning.order_id {
            self.unique_orders.insert(order_id.clone());
        }

        *self.category_counts.entry(warning.category).or_insert(0) += 1;

        let id = warning.id;
        if self.warnings.len() < self.config.max_warnings {
            self.warnings.push(warning);
        }

        Some(id)
    }

    /// Record a simple warning with just category and message.
    pub fn record_simple(
        &mut self,
        category: WarningCategory,
        message: impl Into<String>,
    ) -> Option<u64> {
        let id = self.next_id();
        self.record(Warning::new(id, category, message))
    }

    /// Record a warning about a specific order.
    pub fn record_order_warning(
        &mut self,
        category: WarningCategory,
        message: impl Into<String>,
        order_id: impl Into<String>,
        price: Option<Decimal>,
    ) -> Option<u64> {
        let id = self.next_id();
        let mut warning = Warning::new(id, category, message).with_order_id(order_id);
        if let Some(p) = price {
            warning = warning.with_price(p);
        }
        self.record(warning)
    }

    /// Number of warnings held in memory.
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Total recorded count, including any past the storage cap.
    pub fn total_count(&self) -> u64 {
        self.category_counts.values().sum()
    }

    pub fn count_by_category(&self, category: WarningCategory) -> u64 {
        self.category_counts.get(&category).copied().unwrap_or(0)
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn warnings_by_category(&self, category: WarningCategory) -> Vec<&Warning> {
        self.warnings
            .iter()
            .filter(|w| w.category == category)
            .collect()
    }

    pub fn summary(&self) -> WarningSummary {
        let mut by_category = HashMap::new();
        let mut by_severity = HashMap::new();

        for (cat, count) in &self.category_counts {
            by_category.insert(cat.name().to_string(), *count);
            *by_severity.entry(cat.severity()).or_insert(0) += *count;
        }

        WarningSummary {
            total: self.total_count(),
            by_category,
            by_severity,
            unique_orders: self.unique_orders.len() as u64,
        }
    }

    /// Export summary and warnings to a JSON file.
    pub fn export_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        #[derive(Serialize)]
        struct Export<'a> {
            summary: WarningSummary,
            warnings: &'a [Warning],
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(
            &mut writer,
            &Export {
                summary: self.summary(),
                warnings: &self.warnings,
            },
        )?;
        writer.flush()?;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.warnings.clear();
        self.category_counts.clear();
        self.recent.clear();
        self.unique_orders.clear();
    }
}

impl Default for WarningTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_message(message: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    message.hash(&mut hasher);
    hasher.finish()
}
