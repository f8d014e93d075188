//! Price level implementation with FIFO queue
//!
//! A price level holds every resting order at one price. Orders keep their
//! arrival order so the oldest order at the best price is matched first.

use std::collections::VecDeque;
use types::ids::{OrderId, UserId};
use types::numeric::Quantity;

/// Entry in the price level queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEntry {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub remaining: Quantity,
}

/// A price level containing orders at a specific price
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    /// Queue of orders at this price level (FIFO order)
    orders: VecDeque<OrderEntry>,
    /// Total quantity available at this level
    total_quantity: Quantity,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the back of the queue (time priority)
    pub fn insert(&mut self, order_id: OrderId, user_id: UserId, remaining: Quantity) {
        self.orders.push_back(OrderEntry {
            order_id,
            user_id,
            remaining,
        });
        self.total_quantity = self.total_quantity + remaining;
    }

    /// Remove an order; returns its remaining quantity
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Quantity> {
        let position = self.orders.iter().position(|entry| &entry.order_id == order_id)?;
        let entry = self.orders.remove(position)?;
        self.total_quantity = self
            .total_quantity
            .checked_sub(entry.remaining)
            .unwrap_or_else(Quantity::zero);
        Some(entry.remaining)
    }

    /// Set an order's remaining quantity in place, keeping its queue position
    ///
    /// A zero quantity removes the order. Returns false if it is not queued here.
    pub fn update(&mut self, order_id: &OrderId, remaining: Quantity) -> bool {
        if remaining.is_zero() {
            return self.remove(order_id).is_some();
        }
        let Some(entry) = self.orders.iter_mut().find(|entry| &entry.order_id == order_id) else {
            return false;
        };
        let previous = entry.remaining;
        entry.remaining = remaining;
        self.total_quantity = (self
            .total_quantity
            .checked_sub(previous)
            .unwrap_or_else(Quantity::zero))
            + remaining;
        true
    }

    /// Entries in time priority
    pub fn iter(&self) -> impl Iterator<Item = &OrderEntry> {
        self.orders.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}
