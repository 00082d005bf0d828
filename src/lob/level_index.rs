//! Secondary index from (side, price) to the ids resting at that price.
//!
//! The index does not own orders; ids are back-references into the
//! `OrderStore`. It exists so membership changes are O(1) average instead of
//! rescanning every live order to find those at a price.
//!
//! # Invariant
//!
//! Every id present at (side, price) must exist in the order store with
//! exactly that side and price. The reconstructor is the only writer and keeps
//! both structures in step.
//!
//! # Absent vs. empty
//!
//! Removing the last id leaves an *empty* bucket behind rather than deleting
//! it. An empty bucket is semantically absent: it is skipped by `prices`,
//! `best_prices` and `level_count`. `has_bucket` still reports it, and
//! `prune` deletes it.
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | `add` | O(log L) + O(1) amortized |
//! | `remove` | O(log L) + O(1) amortized |
//! | `take_level` | O(log L) |
//! | `best_prices(n)` | O(n + empty buckets skipped) |

use std::collections::BTreeMap;

use ahash::AHashSet;
use rust_decimal::Decimal;

use crate::types::Side;

/// Outcome of removing an id from the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelRemoval {
    /// Bucket or id was not present; nothing changed
    NotIndexed,
    /// Id removed, other ids remain at the price
    Removed,
    /// Id removed and the bucket is now empty
    LevelEmptied,
}

impl LevelRemoval {
    /// True if an id was actually removed.
    #[inline]
    pub fn removed(self) -> bool {
        !matches!(self, LevelRemoval::NotIndexed)
    }
}

type Levels = BTreeMap<Decimal, AHashSet<String>>;

/// Side → price → set of order ids.
///
/// Both sides are kept in ascending price order; the buy side is read from
/// the back so its best price comes first.
#[derive(Debug, Clone, Default)]
pub struct LevelIndex {
    buy: Levels,
    sell: Levels,
}

impl LevelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn levels(&self, side: Side) -> &Levels {
        match side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        }
    }

    #[inline]
    fn levels_mut(&mut self, side: Side) -> &mut Levels {
        match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        }
    }

    /// Insert `id` at (side, price), creating the bucket if absent.
    ///
    /// Returns `false` if the id was already indexed there.
    #[inline]
    pub fn add(&mut self, side: Side, price: Decimal, id: impl Into<String>) -> bool {
        self.levels_mut(side).entry(price).or_default().insert(id.into())
    }

    /// Remove `id` from (side, price). Missing bucket or id is a no-op.
    #[inline]
    pub fn remove(&mut self, side: Side, price: Decimal, id: &str) -> LevelRemoval {
        let Some(ids) = self.levels_mut(side).get_mut(&price) else {
            return LevelRemoval::NotIndexed;
        };
        if !ids.remove(id) {
            LevelRemoval::NotIndexed
        } else if ids.is_empty() {
            LevelRemoval::LevelEmptied
        } else {
            LevelRemoval::Removed
        }
    }

    /// Drop the bucket at (side, price) if it exists and is empty.
    ///
    /// Returns `true` if a bucket was dropped.
    pub fn prune(&mut self, side: Side, price: Decimal) -> bool {
        let levels = self.levels_mut(side);
        if levels.get(&price).is_some_and(|ids| ids.is_empty()) {
            levels.remove(&price);
            true
        } else {
            false
        }
    }

    /// Drop every empty bucket on both sides. Returns the number dropped.
    pub fn prune_all(&mut self) -> usize {
        let before = self.buy.len() + self.sell.len();
        self.buy.retain(|_, ids| !ids.is_empty());
        self.sell.retain(|_, ids| !ids.is_empty());
        before - (self.buy.len() + self.sell.len())
    }

    /// Detach the whole bucket at (side, price), returning its ids.
    pub fn take_level(&mut self, side: Side, price: Decimal) -> Option<AHashSet<String>> {
        self.levels_mut(side).remove(&price)
    }

    /// Prices with at least one id, ascending.
    pub fn prices(&self, side: Side) -> impl Iterator<Item = Decimal> + '_ {
        self.levels(side)
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(&price, _)| price)
    }

    /// Up to `n` non-empty prices, most competitive first.
    pub fn best_prices(&self, side: Side, n: usize) -> Vec<Decimal> {
        let non_empty = |(price, ids): (&Decimal, &AHashSet<String>)| {
            (!ids.is_empty()).then_some(*price)
        };
        match side {
            Side::Buy => self.buy.iter().rev().filter_map(non_empty).take(n).collect(),
            Side::Sell => self.sell.iter().filter_map(non_empty).take(n).collect(),
        }
    }

    /// Non-empty prices on `side` that an incoming opposite-side order at
    /// `incoming` strictly crosses.
    ///
    /// `side` is the resting side; the incoming order is on `side.opposite()`.
    pub fn crossed_prices(&self, side: Side, incoming: Decimal) -> Vec<Decimal> {
        let aggressor = side.opposite();
        let non_empty = |(price, ids): (&Decimal, &AHashSet<String>)| {
            (!ids.is_empty()).then_some(*price)
        };
        // Crossed levels are always the most competitive ones, so walk from
        // the best price and stop at the first level that does not cross.
        match side {
            Side::Buy => self
                .buy
                .iter()
                .rev()
                .filter_map(non_empty)
                .take_while(|&p| aggressor.crosses(incoming, p))
                .collect(),
            Side::Sell => self
                .sell
                .iter()
                .filter_map(non_empty)
                .take_while(|&p| aggressor.crosses(incoming, p))
                .collect(),
        }
    }

    /// Ids at (side, price), or `None` if there is no bucket.
    #[inline]
    pub fn ids_at(&self, side: Side, price: Decimal) -> Option<&AHashSet<String>> {
        self.levels(side).get(&price)
    }

    #[inline]
    pub fn contains(&self, side: Side, price: Decimal, id: &str) -> bool {
        self.ids_at(side, price).is_some_and(|ids| ids.contains(id))
    }

    /// Whether a bucket exists at (side, price), even if empty.
    #[inline]
    pub fn has_bucket(&self, side: Side, price: Decimal) -> bool {
        self.levels(side).contains_key(&price)
    }

    /// Number of non-empty levels on `side`.
    pub fn level_count(&self, side: Side) -> usize {
        self.levels(side).values().filter(|ids| !ids.is_empty()).count()
    }

    /// Number of buckets on `side`, empty ones included.
    pub fn bucket_count(&self, side: Side) -> usize {
        self.levels(side).len()
    }

    /// Total ids indexed across both sides.
    pub fn id_count(&self) -> usize {
        self.buy.values().chain(self.sell.values()).map(|ids| ids.len()).sum()
    }

    pub fn clear(&mut self) {
        self.buy.clear();
        self.sell.clear();
    }
}
