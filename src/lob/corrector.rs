//! Crossed-book correction.
//!
//! The feed can drop or reorder events. When that happens a newly opened
//! order may appear to cross resting liquidity on the opposite side that
//! should already have traded away. Without trade history there is no way
//! to know how much of the crossed liquidity really filled, so every
//! opposite-side level the incoming price strictly crosses is treated as
//! stale and purged in full, from both the index and the order store.
//!
//! This is lossy: legitimate resting quantity at a crossed level is removed
//! together with whatever actually traded. It is an accepted approximation,
//! not a fill reconciliation.

use rust_decimal::Decimal;

use super::level_index::LevelIndex;
use super::order_store::OrderStore;
use crate::types::{Order, Side};

/// One purged price level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgedLevel {
    pub price: Decimal,
    /// Ids removed from the level, sorted for stable reporting
    pub order_ids: Vec<String>,
    /// Sum of the removed orders' quantities
    pub quantity: Decimal,
}

/// Result of checking one incoming order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    /// Side the levels were purged from (opposite of the incoming order)
    pub side: Side,
    pub levels: Vec<PurgedLevel>,
}

impl Correction {
    fn none(side: Side) -> Self {
        Self {
            side,
            levels: Vec::new(),
        }
    }

    /// True if nothing was purged.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn purged_prices(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.levels.iter().map(|l| l.price)
    }

    /// Number of orders removed across all purged levels.
    pub fn purged_orders(&self) -> usize {
        self.levels.iter().map(|l| l.order_ids.len()).sum()
    }

    /// Quantity removed across all purged levels.
    pub fn purged_quantity(&self) -> Decimal {
        self.levels
            .iter()
            .fold(Decimal::ZERO, |acc, l| acc.saturating_add(l.quantity))
    }
}

/// Purges opposite-side levels crossed by an incoming order.
///
/// Must run *before* the incoming order is inserted so it sees the book as
/// it was prior to that order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossedBookCorrector;

impl CrossedBookCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Remove every opposite-side level strictly crossed by `incoming`.
    pub fn correct(
        &self,
        incoming: &Order,
        store: &mut OrderStore,
        index: &mut LevelIndex,
    ) -> Correction {
        let resting = incoming.side().opposite();
        let crossed = index.crossed_prices(resting, incoming.price());
        if crossed.is_empty() {
            return Correction::none(resting);
        }

        let mut levels = Vec::with_capacity(crossed.len());
        for price in crossed {
            let Some(ids) = index.take_level(resting, price) else {
                continue;
            };

            let mut quantity = Decimal::ZERO;
            let mut order_ids = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(order) = store.remove(&id) {
                    quantity = quantity.saturating_add(order.quantity());
                }
                order_ids.push(id);
            }
            order_ids.sort_unstable();

            levels.push(PurgedLevel {
                price,
                order_ids,
                quantity,
            });
        }

        Correction {
            side: resting,
            levels,
        }
    }
}
