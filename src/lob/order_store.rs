//! Owning store of live orders keyed by exchange order id.
//!
//! This is the single source of truth for "does this order still exist and
//! what is it". It performs no validation; callers hand it well-typed
//! `Order` values.

use ahash::AHashMap;

use crate::types::Order;

/// Order id → `Order`.
#[derive(Debug, Clone, Default)]
pub struct OrderStore {
    orders: AHashMap<String, Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the previous order under `id`, if any.
    #[inline]
    pub fn put(&mut self, id: impl Into<String>, order: Order) -> Option<Order> {
        self.orders.insert(id.into(), order)
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<&Order> {
        self.orders.get(id)
    }

    /// Remove and return the order, or `None` if it was not present.
    #[inline]
    pub fn remove(&mut self, id: &str) -> Option<Order> {
        self.orders.remove(id)
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.orders.contains_key(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Order)> {
        self.orders.iter().map(|(id, order)| (id.as_str(), order))
    }

    pub fn clear(&mut self) {
        self.orders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use rust_decimal_macros::dec;

    fn order(side: Side, price: rust_decimal::Decimal) -> Order {
        Order::new(side, price, dec!(1))
    }

    #[test]
    fn test_put_get_remove() {
        let mut store = OrderStore::new();
        assert!(store.put("a", order(Side::Buy, dec!(100))).is_none());
        assert_eq!(store.get("a").map(|o| o.price()), Some(dec!(100)));
        assert!(store.contains("a"));

        let removed = store.remove("a");
        assert_eq!(removed, Some(order(Side::Buy, dec!(100))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_overwrites() {
        let mut store = OrderStore::new();
        store.put("a", order(Side::Buy, dec!(100)));
        let previous = store.put("a", order(Side::Sell, dec!(200)));
        assert_eq!(previous, Some(order(Side::Buy, dec!(100))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().side(), Side::Sell);
    }

    #[test]
    fn test_remove_absent_is_none() {
        let mut store = OrderStore::new();
        assert_eq!(store.remove("missing"), None);
        assert_eq!(store.get("missing"), None);
    }
}
