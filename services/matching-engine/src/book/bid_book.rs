//! Bid (buy-side) order book
//!
//! Buy orders sorted by price descending (best bid first). BTreeMap keeps
//! iteration deterministic.

use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::{Price, Quantity};
use types::order::TradeOrder;

use super::price_level::PriceLevel;

/// Bid (buy) side order book
#[derive(Debug, Clone, Default)]
pub struct BidBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an order behind everything already resting at its price
    pub fn insert(&mut self, order: &TradeOrder) {
        self.levels
            .entry(order.price_per_unit)
            .or_default()
            .insert(order.id, order.user_id, order.remaining_amount);
    }

    /// Returns true if the order was found and removed
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> bool {
        let Some(level) = self.levels.get_mut(&price) else {
            return false;
        };
        let removed = level.remove(order_id).is_some();
        if level.is_empty() {
            self.levels.remove(&price);
        }
        removed
    }

    /// Track a fill; a zero remainder drops the order
    pub fn update(&mut self, order_id: &OrderId, price: Price, remaining: Quantity) -> bool {
        let Some(level) = self.levels.get_mut(&price) else {
            return false;
        };
        let updated = level.update(order_id, remaining);
        if level.is_empty() {
            self.levels.remove(&price);
        }
        updated
    }

    /// Highest bid and its total quantity
    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        self.levels
            .iter()
            .next_back()
            .map(|(price, level)| (*price, level.total_quantity()))
    }

    /// Levels from the highest price down
    pub fn levels(&self) -> impl Iterator<Item = (Price, &PriceLevel)> {
        self.levels.iter().rev().map(|(price, level)| (*price, level))
    }

    /// Top `depth` levels, highest first
    pub fn depth_snapshot(&self, depth: usize) -> Vec<(Price, Quantity)> {
        self.levels()
            .take(depth)
            .map(|(price, level)| (price, level.total_quantity()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn order_count(&self) -> usize {
        self.levels.values().map(PriceLevel::order_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use types::ids::UserId;
    use types::order::OrderType;

    fn bid(price: u64, qty: &str) -> TradeOrder {
        let amount = Quantity::from_str(qty).unwrap();
        TradeOrder::new(
            UserId::new(1),
            OrderType::BUY,
            "BTC/USDT".parse().unwrap(),
            amount,
            Price::from_u64(price),
            amount.notional(Price::from_u64(price)).unwrap(),
            1708123456789000000,
        )
    }

    #[test]
    fn test_bid_book_best_bid() {
        let mut book = BidBook::new();
        book.insert(&bid(50000, "1.0"));
        book.insert(&bid(51000, "2.0"));
        book.insert(&bid(49000, "1.5"));

        let (best_price, best_qty) = book.best_bid().unwrap();
        assert_eq!(best_price, Price::from_u64(51000));
        assert_eq!(best_qty, Quantity::from_str("2.0").unwrap());
        assert_eq!(book.order_count(), 3);
    }

    #[test]
    fn test_bid_book_remove_drops_empty_level() {
        let mut book = BidBook::new();
        let order = bid(50000, "1.0");
        book.insert(&order);

        assert!(book.remove(&order.id, order.price_per_unit));
        assert!(book.is_empty());
        assert!(!book.remove(&order.id, order.price_per_unit));
    }

    #[test]
    fn test_bid_book_update() {
        let mut book = BidBook::new();
        let order = bid(50000, "1.0");
        book.insert(&order);

        assert!(book.update(&order.id, order.price_per_unit, Quantity::from_str("0.4").unwrap()));
        assert_eq!(book.best_bid().unwrap().1, Quantity::from_str("0.4").unwrap());
        assert!(book.update(&order.id, order.price_per_unit, Quantity::zero()));
        assert!(book.is_empty());
    }

    #[test]
    fn test_bid_book_depth_snapshot() {
        let mut book = BidBook::new();
        book.insert(&bid(50000, "1.0"));
        book.insert(&bid(51000, "2.0"));
        book.insert(&bid(49000, "1.5"));
        book.insert(&bid(52000, "0.5"));
        book.insert(&bid(52000, "0.25"));

        let depth = book.depth_snapshot(2);
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0], (Price::from_u64(52000), Quantity::from_str("0.75").unwrap()));
        assert_eq!(depth[1].0, Price::from_u64(51000));
        assert_eq!(book.depth_snapshot(10).len(), 4);
    }
}
