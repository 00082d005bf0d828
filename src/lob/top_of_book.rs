//! Depth-limited top-of-book cache.
//!
//! Derived data: every cached level can be recomputed from the order store
//! and level index at any time. The cache exists to avoid re-aggregating on
//! every message and to decide whether a change is visible at all.
//!
//! # Rebuild policy
//!
//! - Insert: rebuild the order's side when the cached side is empty, holds
//!   fewer than `depth` levels, or the price is at or better than the worst
//!   cached price. Anything else lands outside the visible window and is
//!   left alone, so levels beyond `depth` are never cache-accurate until
//!   they enter the window.
//! - Removal: rebuild the order's side only when its price is cached.
//!
//! Sides are independent: rebuilding one never touches the other.
//!
//! # Invariant
//!
//! A cached level's quantity equals the exact sum of the quantities of all
//! orders indexed at that (side, price) as of the side's last rebuild.

use rust_decimal::Decimal;

use super::level_index::LevelIndex;
use super::order_store::OrderStore;
use crate::types::{Level, Side, TopOfBook};

/// Default number of cached levels per side.
pub const DEFAULT_DEPTH: usize = 5;

#[derive(Debug, Clone, Default)]
struct CachedSide {
    levels: Vec<Level>,
    /// Incremented on every rebuild of this side
    version: u64,
}

impl CachedSide {
    fn contains(&self, price: Decimal) -> bool {
        self.levels.iter().any(|l| l.price == price)
    }
}

/// Per-side sorted, aggregated view of the best `depth` levels.
#[derive(Debug, Clone)]
pub struct TopOfBookCache {
    depth: usize,
    buy: CachedSide,
    sell: CachedSide,
}

impl Default for TopOfBookCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

impl TopOfBookCache {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            buy: CachedSide::default(),
            sell: CachedSide::default(),
        }
    }

    #[inline]
    fn cached(&self, side: Side) -> &CachedSide {
        match side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        }
    }

    #[inline]
    fn cached_mut(&mut self, side: Side) -> &mut CachedSide {
        match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Cached levels for `side`, most competitive first.
    #[inline]
    pub fn levels(&self, side: Side) -> &[Level] {
        &self.cached(side).levels
    }

    /// Rebuild counter for `side`. Unchanged version means no rebuild ran.
    #[inline]
    pub fn version(&self, side: Side) -> u64 {
        self.cached(side).version
    }

    /// Whether `price` is one of the cached prices on `side`.
    #[inline]
    pub fn contains_price(&self, side: Side, price: Decimal) -> bool {
        self.cached(side).contains(price)
    }

    /// Whether inserting an order at `price` on `side` can change the
    /// visible window.
    pub fn insertion_affects(&self, side: Side, price: Decimal) -> bool {
        if self.depth == 0 {
            return false;
        }
        let levels = self.levels(side);
        match levels.last() {
            None => true,
            Some(_) if levels.len() < self.depth => true,
            Some(worst) => side.at_or_better(price, worst.price),
        }
    }

    /// Whether removing an order at `price` on `side` can change the
    /// visible window.
    #[inline]
    pub fn removal_affects(&self, side: Side, price: Decimal) -> bool {
        self.contains_price(side, price)
    }

    /// Recompute one side from the store and index.
    pub fn rebuild_side(&mut self, side: Side, store: &OrderStore, index: &LevelIndex) {
        let levels: Vec<Level> = index
            .best_prices(side, self.depth)
            .into_iter()
            .map(|price| Level::new(price, aggregate(store, index, side, price)))
            .collect();

        let cached = self.cached_mut(side);
        cached.levels = levels;
        cached.version += 1;
    }

    /// Recompute both sides.
    pub fn rebuild(&mut self, store: &OrderStore, index: &LevelIndex) {
        for side in Side::ALL {
            self.rebuild_side(side, store, index);
        }
    }

    /// Owned copy of the cached view.
    pub fn snapshot(&self) -> TopOfBook {
        TopOfBook {
            depth: self.depth,
            buy: self.buy.levels.clone(),
            sell: self.sell.levels.clone(),
        }
    }

    /// Drop cached levels. Versions keep counting.
    pub fn clear(&mut self) {
        self.buy.levels.clear();
        self.sell.levels.clear();
    }
}

/// Exact sum of quantities of the orders indexed at (side, price).
fn aggregate(store: &OrderStore, index: &LevelIndex, side: Side, price: Decimal) -> Decimal {
    let Some(ids) = index.ids_at(side, price) else {
        return Decimal::ZERO;
    };
    ids.iter()
        .filter_map(|id| store.get(id))
        .inspect(|order| {
            debug_assert!(
                order.side() == side && order.price() == price,
                "level index entry disagrees with order store: {side} {price} vs {} {}",
                order.side(),
                order.price()
            )
        })
        .fold(Decimal::ZERO, |acc, order| acc.saturating_add(order.quantity()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Order;
    use rust_decimal_macros::dec;

    fn populate(entries: &[(&str, Side, Decimal, Decimal)]) -> (OrderStore, LevelIndex) {
        let mut store = OrderStore::new();
        let mut index = LevelIndex::new();
        for &(id, side, price, qty) in entries {
            store.put(id, Order::new(side, price, qty));
            index.add(side, price, id);
        }
        (store, index)
    }

    #[test]
    fn test_rebuild_sorts_and_aggregates() {
        let (store, index) = populate(&[
            ("a", Side::Buy, dec!(1000), dec!(1)),
            ("b", Side::Buy, dec!(995), dec!(0.5)),
            ("c", Side::Buy, dec!(1010), dec!(0.4)),
            ("d", Side::Buy, dec!(1010), dec!(0.4)),
            ("x", Side::Sell, dec!(2000), dec!(1)),
            ("z", Side::Sell, dec!(2010), dec!(0.4)),
            ("e", Side::Sell, dec!(2010), dec!(1)),
        ]);
        let mut cache = TopOfBookCache::new(5);
        cache.rebuild(&store, &index);

        assert_eq!(
            cache.levels(Side::Buy),
            &[
                Level::new(dec!(1010), dec!(0.8)),
                Level::new(dec!(1000), dec!(1)),
                Level::new(dec!(995), dec!(0.5)),
            ]
        );
        assert_eq!(
            cache.levels(Side::Sell),
            &[Level::new(dec!(2000), dec!(1)), Level::new(dec!(2010), dec!(1.4))]
        );
        assert_eq!(cache.version(Side::Buy), 1);
        assert_eq!(cache.version(Side::Sell), 1);
    }

    #[test]
    fn test_depth_limits_levels() {
        let entries: Vec<(String, Decimal)> = (1..=8)
            .map(|i| (format!("o{i}"), Decimal::from(100 + i)))
            .collect();
        let mut store = OrderStore::new();
        let mut index = LevelIndex::new();
        for (id, price) in &entries {
            store.put(id.as_str(), Order::new(Side::Sell, *price, dec!(1)));
            index.add(Side::Sell, *price, id.as_str());
        }

        let mut cache = TopOfBookCache::new(3);
        cache.rebuild(&store, &index);
        let prices: Vec<Decimal> = cache.levels(Side::Sell).iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![dec!(101), dec!(102), dec!(103)]);
    }

    #[test]
    fn test_sum_is_exact() {
        // 0.1 + 0.2 must be exactly 0.3
        let (store, index) = populate(&[
            ("a", Side::Buy, dec!(50), dec!(0.1)),
            ("b", Side::Buy, dec!(50), dec!(0.2)),
        ]);
        let mut cache = TopOfBookCache::new(5);
        cache.rebuild(&store, &index);
        assert_eq!(cache.levels(Side::Buy)[0].quantity, dec!(0.3));
    }

    #[test]
    fn test_insertion_trigger() {
        let (store, index) = populate(&[
            ("a", Side::Buy, dec!(1000), dec!(1)),
            ("b", Side::Buy, dec!(995), dec!(0.5)),
            ("x", Side::Sell, dec!(2000), dec!(1)),
            ("y", Side::Sell, dec!(2095), dec!(0.5)),
        ]);
        let mut cache = TopOfBookCache::new(2);
        assert!(cache.insertion_affects(Side::Buy, dec!(1)));
        cache.rebuild(&store, &index);

        // full window: only at-or-better than the worst cached level matters
        assert!(cache.insertion_affects(Side::Buy, dec!(996)));
        assert!(cache.insertion_affects(Side::Buy, dec!(995)));
        assert!(!cache.insertion_affects(Side::Buy, dec!(990)));
        assert!(cache.insertion_affects(Side::Sell, dec!(2095)));
        assert!(!cache.insertion_affects(Side::Sell, dec!(2100)));

        // a window with room left always accepts
        let mut wide = TopOfBookCache::new(5);
        wide.rebuild(&store, &index);
        assert!(wide.insertion_affects(Side::Buy, dec!(1)));
    }

    #[test]
    fn test_removal_trigger() {
        let (store, index) = populate(&[
            ("a", Side::Buy, dec!(1000), dec!(1)),
            ("b", Side::Buy, dec!(995), dec!(0.5)),
        ]);
        let mut cache = TopOfBookCache::new(1);
        cache.rebuild(&store, &index);
        assert!(cache.removal_affects(Side::Buy, dec!(1000)));
        assert!(!cache.removal_affects(Side::Buy, dec!(995)));
        assert!(!cache.removal_affects(Side::Sell, dec!(1000)));
    }

    #[test]
    fn test_rebuild_side_is_independent() {
        let (store, index) = populate(&[
            ("a", Side::Buy, dec!(1000), dec!(1)),
            ("x", Side::Sell, dec!(2000), dec!(1)),
        ]);
        let mut cache = TopOfBookCache::new(5);
        cache.rebuild_side(Side::Buy, &store, &index);
        assert_eq!(cache.version(Side::Buy), 1);
        assert_eq!(cache.version(Side::Sell), 0);
        assert!(cache.levels(Side::Sell).is_empty());
    }

    #[test]
    fn test_empty_buckets_are_skipped() {
        let (mut store, mut index) = populate(&[
            ("a", Side::Buy, dec!(1000), dec!(1)),
            ("b", Side::Buy, dec!(995), dec!(0.5)),
        ]);
        store.remove("a");
        index.remove(Side::Buy, dec!(1000), "a");

        let mut cache = TopOfBookCache::new(5);
        cache.rebuild(&store, &index);
        assert_eq!(cache.levels(Side::Buy), &[Level::new(dec!(995), dec!(0.5))]);
    }

    #[test]
    fn test_zero_depth() {
        let (store, index) = populate(&[("a", Side::Buy, dec!(1000), dec!(1))]);
        let mut cache = TopOfBookCache::new(0);
        assert!(!cache.insertion_affects(Side::Buy, dec!(1000)));
        cache.rebuild(&store, &index);
        assert!(cache.snapshot().is_empty());
    }
}
