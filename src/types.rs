//! Core data types for level-3 orders and top-of-book snapshots.
//!
//! Prices and quantities are `Decimal`:
//! - Totally ordered, so prices can key a `BTreeMap` directly
//! - Exact, so level aggregation does not depend on summation order
//! - Parsed from either JSON strings (`"1000.5"`, `".5"`) or JSON numbers

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{BookError, Result};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Resting bid
    Buy,
    /// Resting ask
    Sell,
}

impl Side {
    /// Both sides, buy first.
    pub const ALL: [Side; 2] = [Side::Buy, Side::Sell];

    /// Wire name of the side.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    /// The side an incoming order of this side would trade against.
    #[inline(always)]
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Check if this is a buy.
    #[inline(always)]
    pub fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Check if this is a sell.
    #[inline(always)]
    pub fn is_sell(self) -> bool {
        matches!(self, Side::Sell)
    }

    /// Whether an incoming order of this side at `incoming` strictly crosses
    /// a resting opposite-side level at `resting`. Touching is not crossing.
    #[inline]
    pub fn crosses(self, incoming: Decimal, resting: Decimal) -> bool {
        match self {
            Side::Buy => incoming > resting,
            Side::Sell => incoming < resting,
        }
    }

    /// Whether `price` is at least as competitive as `reference` on this side.
    #[inline]
    pub fn at_or_better(self, price: Decimal, reference: Decimal) -> bool {
        match self {
            Side::Buy => price >= reference,
            Side::Sell => price <= reference,
        }
    }
}

impl FromStr for Side {
    type Err = BookError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(BookError::InvalidSide(other.to_string())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Decimal parsing
// ============================================================================

/// Parse a decimal from feed text.
///
/// Accepts plain (`"1000"`, `"0.4"`), leading-dot (`".5"`) and scientific
/// (`"1e-3"`) notation.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let padded;
    let s = if let Some(rest) = s.strip_prefix('.') {
        padded = format!("0.{rest}");
        padded.as_str()
    } else if let Some(rest) = s.strip_prefix("-.") {
        padded = format!("-0.{rest}");
        padded.as_str()
    } else {
        s
    };

    Decimal::from_str(s)
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

/// Interpret a JSON value (string or number) as a decimal.
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

/// Serde helper: deserialize a decimal that may come as a string or number.
pub fn deserialize_decimal<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    decimal_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid decimal: {value}")))
}

// ============================================================================
// Order
// ============================================================================

/// A resting order.
///
/// Immutable once constructed: a fill or cancel removes the whole order,
/// quantity is never decremented in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    side: Side,
    price: Decimal,
    quantity: Decimal,
}

impl Order {
    /// Create an order without validating price or quantity.
    ///
    /// Unchecked. `BookReconstructor::process_message` re-validates every
    /// open and drops one with a non-positive price or quantity as malformed.
    pub fn new(side: Side, price: Decimal, quantity: Decimal) -> Self {
        Self {
            side,
            price,
            quantity,
        }
    }

    /// Create an order, rejecting non-positive price or quantity.
    pub fn try_new(side: Side, price: Decimal, quantity: Decimal) -> Result<Self> {
        let order = Self::new(side, price, quantity);
        order.validate()?;
        Ok(order)
    }

    /// Check that price and quantity are both strictly positive.
    pub fn validate(&self) -> Result<()> {
        if self.price <= Decimal::ZERO {
            return Err(BookError::InvalidPrice(self.price.to_string()));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(BookError::InvalidQuantity(self.quantity.to_string()));
        }
        Ok(())
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn price(&self) -> Decimal {
        self.price
    }

    #[inline]
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }
}

// ============================================================================
// Top-of-book snapshot
// ============================================================================

/// One aggregated price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: Decimal,
    /// Exact sum of the quantities of every order indexed at `price`
    pub quantity: Decimal,
}

impl Level {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

impl From<(Decimal, Decimal)> for Level {
    fn from((price, quantity): (Decimal, Decimal)) -> Self {
        Self::new(price, quantity)
    }
}

/// Book consistency status of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookConsistency {
    /// best bid < best ask
    Valid,
    /// One or both sides have no levels
    Empty,
    /// best bid == best ask
    Locked,
    /// best bid > best ask
    Crossed,
}

impl BookConsistency {
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, BookConsistency::Valid)
    }

    #[inline]
    pub fn is_crossed(&self) -> bool {
        matches!(self, BookConsistency::Crossed)
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        matches!(self, BookConsistency::Locked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, BookConsistency::Empty)
    }
}

/// Depth-limited view of the book.
///
/// `buy` is sorted highest price first, `sell` lowest price first, so index 0
/// is always the most competitive level. Each side holds at most `depth`
/// levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub depth: usize,
    pub buy: Vec<Level>,
    pub sell: Vec<Level>,
}

impl TopOfBook {
    /// Create an empty snapshot for the given depth.
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            buy: Vec::with_capacity(depth),
            sell: Vec::with_capacity(depth),
        }
    }

    /// Levels for one side.
    #[inline]
    pub fn side(&self, side: Side) -> &[Level] {
        match side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        }
    }

    #[inline]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.buy.first().map(|l| l.price)
    }

    #[inline]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.sell.first().map(|l| l.price)
    }

    pub fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.sell.is_empty()
    }

    /// Compare best bid against best ask.
    pub fn check_consistency(&self) -> BookConsistency {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => {
                if bid < ask {
                    BookConsistency::Valid
                } else if bid == ask {
                    BookConsistency::Locked
                } else {
                    BookConsistency::Crossed
                }
            }
            _ => BookConsistency::Empty,
        }
    }

    /// Average of best bid and best ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Best ask minus best bid.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Total quantity across the visible buy levels.
    pub fn total_buy_quantity(&self) -> Decimal {
        self.buy
            .iter()
            .fold(Decimal::ZERO, |acc, l| acc.saturating_add(l.quantity))
    }

    /// Total quantity across the visible sell levels.
    pub fn total_sell_quantity(&self) -> Decimal {
        self.sell
            .iter()
            .fold(Decimal::ZERO, |acc, l| acc.saturating_add(l.quantity))
    }

    /// Normalized difference between visible buy and sell quantity.
    ///
    /// Range: [-1, 1]. Positive means more resting buy quantity.
    pub fn depth_imbalance(&self) -> Option<Decimal> {
        let buy = self.total_buy_quantity();
        let sell = self.total_sell_quantity();
        let total = buy + sell;
        if total > Decimal::ZERO {
            Some((buy - sell) / total)
        } else {
            None
        }
    }
}

impl fmt::Display for TopOfBook {
    /// Sells from worst to best, a separator, then buys from best to worst.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for level in self.sell.iter().rev() {
            writeln!(f, "{} @ {}", level.quantity, level.price)?;
        }
        writeln!(f, "{}", "-".repeat(21))?;
        for level in &self.buy {
            writeln!(f, "{} @ {}", level.quantity, level.price)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // =========================================================================
    // Side
    // =========================================================================

    #[test]
    fn test_side_parse() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
        assert_eq!(
            "BUY".parse::<Side>().unwrap_err(),
            BookError::InvalidSide("BUY".into())
        );
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert!(Side::Buy.is_buy());
        assert!(Side::Sell.is_sell());
    }

    #[test]
    fn test_crossing_is_strict() {
        assert!(Side::Buy.crosses(dec!(2030), dec!(2010)));
        assert!(!Side::Buy.crosses(dec!(2010), dec!(2010)));
        assert!(!Side::Buy.crosses(dec!(2000), dec!(2010)));

        assert!(Side::Sell.crosses(dec!(990), dec!(1000)));
        assert!(!Side::Sell.crosses(dec!(1000), dec!(1000)));
    }

    #[test]
    fn test_side_serde() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"buy\"");
        let side: Side = serde_json::from_str("\"sell\"").unwrap();
        assert_eq!(side, Side::Sell);
    }

    // =========================================================================
    // Decimal parsing
    // =========================================================================

    #[test]
    fn test_parse_decimal_forms() {
        assert_eq!(parse_decimal("1000"), Some(dec!(1000)));
        assert_eq!(parse_decimal(".5"), Some(dec!(0.5)));
        assert_eq!(parse_decimal("-.25"), Some(dec!(-0.25)));
        assert_eq!(parse_decimal(" 0.40 "), Some(dec!(0.4)));
        assert_eq!(parse_decimal("1e-3"), Some(dec!(0.001)));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn test_decimal_from_value() {
        assert_eq!(
            decimal_from_value(&serde_json::json!("2010.5")),
            Some(dec!(2010.5))
        );
        assert_eq!(decimal_from_value(&serde_json::json!(0.4)), Some(dec!(0.4)));
        assert_eq!(decimal_from_value(&serde_json::json!(7)), Some(dec!(7)));
        assert_eq!(decimal_from_value(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_scale_does_not_change_identity() {
        assert_eq!(parse_decimal("1000.0"), parse_decimal("1000"));
    }

    // =========================================================================
    // Order
    // =========================================================================

    #[test]
    fn test_order_validation() {
        assert!(Order::try_new(Side::Buy, dec!(1000), dec!(1.5)).is_ok());
        assert!(matches!(
            Order::try_new(Side::Buy, dec!(0), dec!(1)),
            Err(BookError::InvalidPrice(_))
        ));
        assert!(matches!(
            Order::try_new(Side::Sell, dec!(10), dec!(-1)),
            Err(BookError::InvalidQuantity(_))
        ));
        assert!(Order::new(Side::Buy, dec!(5), dec!(2)).validate().is_ok());
        assert!(Order::new(Side::Buy, dec!(5), dec!(0)).validate().is_err());
    }

    // =========================================================================
    // TopOfBook
    // =========================================================================

    fn sample() -> TopOfBook {
        TopOfBook {
            depth: 5,
            buy: vec![
                Level::new(dec!(1010), dec!(0.4)),
                Level::new(dec!(1000), dec!(1)),
            ],
            sell: vec![
                Level::new(dec!(2000), dec!(1)),
                Level::new(dec!(2010), dec!(0.4)),
            ],
        }
    }

    #[test]
    fn test_top_of_book_prices() {
        let top = sample();
        assert_eq!(top.best_bid(), Some(dec!(1010)));
        assert_eq!(top.best_ask(), Some(dec!(2000)));
        assert_eq!(top.mid_price(), Some(dec!(1505)));
        assert_eq!(top.spread(), Some(dec!(990)));
        assert_eq!(top.check_consistency(), BookConsistency::Valid);
    }

    #[test]
    fn test_top_of_book_consistency_states() {
        let mut top = sample();
        top.sell[0].price = dec!(1010);
        assert!(top.check_consistency().is_locked());
        top.sell[0].price = dec!(1005);
        assert!(top.check_consistency().is_crossed());
        assert!(TopOfBook::new(5).check_consistency().is_empty());
    }

    #[test]
    fn test_top_of_book_imbalance() {
        let top = sample();
        assert_eq!(top.total_buy_quantity(), dec!(1.4));
        assert_eq!(top.total_sell_quantity(), dec!(1.4));
        assert_eq!(top.depth_imbalance(), Some(dec!(0)));
        assert_eq!(TopOfBook::new(5).depth_imbalance(), None);
    }

    #[test]
    fn test_top_of_book_display() {
        let rendered = sample().to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "0.4 @ 2010",
                "1 @ 2000",
                "---------------------",
                "0.4 @ 1010",
                "1 @ 1000",
            ]
        );
    }
}
