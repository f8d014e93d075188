//! Order book infrastructure
//!
//! Price levels, the two sides of a pair, and [`PairBook`], the resting
//! index of one pair.

pub mod ask_book;
pub mod bid_book;
pub mod price_level;

pub use ask_book::AskBook;
pub use bid_book::BidBook;
pub use price_level::{OrderEntry, PriceLevel};

use serde::{Deserialize, Serialize};
use types::ids::OrderId;
use types::market::CurrencyPair;
use types::numeric::{Price, Quantity};
use types::order::{OrderType, TradeOrder};

use crate::matching::crossing::incoming_can_match;

/// Aggregated depth of one pair, best levels first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub pair: CurrencyPair,
    pub bids: Vec<(Price, Quantity)>,
    pub asks: Vec<(Price, Quantity)>,
}

/// Resting orders of one pair in price-time priority
#[derive(Debug, Clone)]
pub struct PairBook {
    pair: CurrencyPair,
    bids: BidBook,
    asks: AskBook,
}

impl PairBook {
    pub fn new(pair: CurrencyPair) -> Self {
        Self {
            pair,
            bids: BidBook::new(),
            asks: AskBook::new(),
        }
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    pub fn insert(&mut self, order: &TradeOrder) {
        match order.order_type {
            OrderType::BUY => self.bids.insert(order),
            OrderType::SELL => self.asks.insert(order),
        }
    }

    pub fn remove(&mut self, order: &TradeOrder) -> bool {
        match order.order_type {
            OrderType::BUY => self.bids.remove(&order.id, order.price_per_unit),
            OrderType::SELL => self.asks.remove(&order.id, order.price_per_unit),
        }
    }

    /// Mirror an order's remaining amount; non-resting orders are dropped
    pub fn sync(&mut self, order: &TradeOrder) -> bool {
        if !order.is_resting() {
            return self.remove(order);
        }
        match order.order_type {
            OrderType::BUY => self
                .bids
                .update(&order.id, order.price_per_unit, order.remaining_amount),
            OrderType::SELL => self
                .asks
                .update(&order.id, order.price_per_unit, order.remaining_amount),
        }
    }

    /// Mirror an order that may already be queued, keeping its position;
    /// a resting order not yet queued joins the back of its level
    pub fn place(&mut self, order: &TradeOrder) {
        if !self.sync(order) && order.is_resting() {
            self.insert(order);
        }
    }

    /// Makers eligible against `taker`, best price first, then oldest first
    ///
    /// Orders owned by the taker's user are skipped.
    pub fn candidates(&self, taker: &TradeOrder) -> Vec<OrderId> {
        let levels: Box<dyn Iterator<Item = (Price, &PriceLevel)> + '_> = match taker.order_type {
            OrderType::BUY => Box::new(self.asks.levels()),
            OrderType::SELL => Box::new(self.bids.levels()),
        };
        levels
            .take_while(|(price, _)| {
                incoming_can_match(taker.order_type, taker.price_per_unit, *price)
            })
            .flat_map(|(_, level)| level.iter())
            .filter(|entry| entry.user_id != taker.user_id)
            .map(|entry| entry.order_id)
            .collect()
    }

    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        self.bids.best_bid()
    }

    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        self.asks.best_ask()
    }

    pub fn depth(&self, levels: usize) -> DepthSnapshot {
        DepthSnapshot {
            pair: self.pair.clone(),
            bids: self.bids.depth_snapshot(levels),
            asks: self.asks.depth_snapshot(levels),
        }
    }

    pub fn order_count(&self) -> usize {
        self.bids.order_count() + self.asks.order_count()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
