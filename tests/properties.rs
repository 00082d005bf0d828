//! Property-based tests for book invariants.
//!
//! - open followed by done/match restores store and index
//! - cached levels are strictly ordered, bounded by depth, and equal to a
//!   fresh recomputation from store + index (exact aggregates included)
//! - every indexed id is stored with the same side and price
//! - records without a type never change the book

use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;

use l3_lob_reconstructor::{
    BookConfig, BookReconstructor, FeedMessage, SeedSnapshot, Side, TopOfBookCache,
};

/// Generate order side
fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

/// Prices on a coarse tick grid so levels collide often
fn arb_price() -> impl Strategy<Value = Decimal> {
    (1i64..40).prop_map(|ticks| Decimal::new(ticks * 25, 1))
}

/// Quantities with one to three decimal places
fn arb_quantity() -> impl Strategy<Value = Decimal> {
    (1i64..5_000, 1u32..4).prop_map(|(units, scale)| Decimal::new(units, scale))
}

/// Small id pool so removals and reopens hit live orders
fn arb_order_id() -> impl Strategy<Value = String> {
    (0u8..16).prop_map(|n| format!("o{n}"))
}

fn arb_message() -> impl Strategy<Value = FeedMessage> {
    prop_oneof![
        3 => (arb_order_id(), arb_side(), arb_price(), arb_quantity())
            .prop_map(|(id, side, price, qty)| FeedMessage::open(id, side, price, qty)),
        1 => arb_order_id().prop_map(FeedMessage::done),
        1 => arb_order_id().prop_map(FeedMessage::matched),
    ]
}

/// A non-crossed seed: bids below 100, asks above 100.
fn arb_snapshot() -> impl Strategy<Value = SeedSnapshot> {
    let bid = (1i64..100, arb_quantity());
    let ask = (101i64..200, arb_quantity());
    (
        prop::collection::vec(bid, 0..20),
        prop::collection::vec(ask, 0..20),
    )
        .prop_map(|(bids, asks)| {
            let mut snapshot = SeedSnapshot::new();
            for (i, (price, qty)) in bids.into_iter().enumerate() {
                snapshot = snapshot.with_bid(Decimal::from(price), qty, format!("b{i}"));
            }
            for (i, (price, qty)) in asks.into_iter().enumerate() {
                snapshot = snapshot.with_ask(Decimal::from(price), qty, format!("a{i}"));
            }
            snapshot
        })
}

fn quiet(depth: usize) -> BookConfig {
    BookConfig::new(depth).with_logging(false)
}

/// Sorted (id, side, price, quantity) rows of the order store.
fn store_rows(book: &BookReconstructor) -> Vec<(String, Side, Decimal, Decimal)> {
    let mut rows: Vec<_> = book
        .store()
        .iter()
        .map(|(id, o)| (id.to_string(), o.side(), o.price(), o.quantity()))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

/// Sorted (side, price, id) rows of the level index.
fn index_rows(book: &BookReconstructor) -> Vec<(bool, Decimal, String)> {
    let mut rows = Vec::new();
    for side in Side::ALL {
        for price in book.index().prices(side) {
            if let Some(ids) = book.index().ids_at(side, price) {
                rows.extend(ids.iter().map(|id| (side.is_buy(), price, id.clone())));
            }
        }
    }
    rows.sort();
    rows
}

fn check_invariants(book: &BookReconstructor) -> Result<(), TestCaseError> {
    let depth = book.depth();

    let buy = book.levels(Side::Buy);
    let sell = book.levels(Side::Sell);
    prop_assert!(buy.len() <= depth);
    prop_assert!(sell.len() <= depth);
    prop_assert!(buy.windows(2).all(|w| w[0].price > w[1].price));
    prop_assert!(sell.windows(2).all(|w| w[0].price < w[1].price));

    for side in Side::ALL {
        for level in book.levels(side) {
            let ids = book.index().ids_at(side, level.price);
            prop_assert!(ids.is_some_and(|ids| !ids.is_empty()));
            let exact = ids
                .into_iter()
                .flatten()
                .filter_map(|id| book.order(id))
                .fold(Decimal::ZERO, |acc, o| acc + o.quantity());
            prop_assert_eq!(level.quantity, exact);
        }
    }

    let mut fresh = TopOfBookCache::new(depth);
    fresh.rebuild(book.store(), book.index());
    prop_assert_eq!(fresh.snapshot(), book.top_of_book());

    for (side_is_buy, price, id) in index_rows(book) {
        let order = book.order(&id);
        prop_assert!(order.is_some());
        if let Some(order) = order {
            prop_assert_eq!(order.side().is_buy(), side_is_buy);
            prop_assert_eq!(order.price(), price);
        }
    }
    prop_assert_eq!(book.index().id_count(), book.order_count());

    Ok(())
}

proptest! {
    #[test]
    fn prop_open_then_remove_restores_state(
        snapshot in arb_snapshot(),
        depth in 1usize..6,
        side in arb_side(),
        qty in arb_quantity(),
        ticks in 1i64..200,
        use_match in any::<bool>(),
    ) {
        let mut book = BookReconstructor::from_snapshot(quiet(depth), &snapshot);

        // Keep the probe from crossing the seed so nothing is purged.
        let price = match side {
            Side::Buy => Decimal::from(ticks.min(100)),
            Side::Sell => Decimal::from(ticks.max(100)),
        };

        let store_before = store_rows(&book);
        let index_before = index_rows(&book);
        let top_before = book.top_of_book();

        book.process_message(&FeedMessage::open("probe", side, price, qty));
        prop_assert!(book.order("probe").is_some());

        let removal = if use_match {
            FeedMessage::matched("probe")
        } else {
            FeedMessage::done("probe")
        };
        book.process_message(&removal);

        prop_assert!(book.order("probe").is_none());
        prop_assert!(!book.index().contains(side, price, "probe"));
        prop_assert_eq!(store_rows(&book), store_before);
        prop_assert_eq!(index_rows(&book), index_before);
        prop_assert_eq!(book.top_of_book(), top_before);
    }

    #[test]
    fn prop_invariants_hold_after_every_message(
        messages in prop::collection::vec(arb_message(), 1..120),
        depth in 0usize..6,
        prune in any::<bool>(),
    ) {
        let mut book = BookReconstructor::with_config(quiet(depth).with_level_pruning(prune));
        for msg in &messages {
            book.process_message(msg);
            check_invariants(&book)?;
        }
    }

    #[test]
    fn prop_invariants_hold_from_seed(
        snapshot in arb_snapshot(),
        messages in prop::collection::vec(arb_message(), 0..60),
        depth in 1usize..8,
    ) {
        let mut book = BookReconstructor::from_snapshot(quiet(depth), &snapshot);
        check_invariants(&book)?;
        prop_assert_eq!(book.order_count(), snapshot.len());

        for msg in &messages {
            book.process_message(msg);
            check_invariants(&book)?;
        }
    }

    #[test]
    fn prop_untyped_records_change_nothing(
        snapshot in arb_snapshot(),
        id in arb_order_id(),
        side in arb_side(),
        price in arb_price(),
    ) {
        let mut book = BookReconstructor::from_snapshot(quiet(5), &snapshot);
        let store_before = store_rows(&book);
        let top_before = book.top_of_book();

        let outcome = book.process_value(&json!({
            "order_id": id, "side": side.as_str(), "price": price.to_string(), "size": "1"
        }));

        prop_assert!(outcome.is_malformed());
        prop_assert_eq!(store_rows(&book), store_before);
        prop_assert_eq!(book.top_of_book(), top_before);
    }
}
