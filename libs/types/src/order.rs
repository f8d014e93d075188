//! Trade order lifecycle types
//!
//! OPEN → PARTIALLY_FILLED → FILLED, or CANCELLED from either resting state.
//! FILLED and CANCELLED are terminal: a terminal order is never mutated
//! again.

use crate::errors::OrderError;
use crate::ids::{OrderId, UserId};
use crate::market::{Currency, CurrencyPair};
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Buy base, pay quote
    BUY,
    /// Sell base, receive quote
    SELL,
}

impl OrderType {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            OrderType::BUY => OrderType::SELL,
            OrderType::SELL => OrderType::BUY,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::BUY => f.write_str("BUY"),
            OrderType::SELL => f.write_str("SELL"),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// Status implied by the fill level of a live order
    pub fn from_fill(amount: Quantity, remaining: Quantity) -> Self {
        if remaining.is_zero() {
            OrderStatus::Filled
        } else if remaining < amount {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Open
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limit order for `amount` of `pair.base` at `price_per_unit` in `pair.quote`
///
/// Invariant: amount = matched_amount + remaining_amount
///
/// `locked_amount` is the part of the funds locked at creation that no fill
/// has consumed yet, denominated in [`TradeOrder::lock_currency`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_type: OrderType,
    pub pair: CurrencyPair,
    pub amount: Quantity,
    pub matched_amount: Quantity,
    pub remaining_amount: Quantity,
    pub price_per_unit: Price,
    pub status: OrderStatus,
    pub locked_amount: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: u64,
}

impl TradeOrder {
    /// Create a new OPEN order holding `locked_amount` of reserved funds
    pub fn new(
        user_id: UserId,
        order_type: OrderType,
        pair: CurrencyPair,
        amount: Quantity,
        price_per_unit: Price,
        locked_amount: Decimal,
        timestamp: i64,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            order_type,
            pair,
            amount,
            matched_amount: Quantity::zero(),
            remaining_amount: amount,
            price_per_unit,
            status: OrderStatus::Open,
            locked_amount,
            created_at: timestamp,
            updated_at: timestamp,
            version: 0,
        }
    }

    pub fn base_currency(&self) -> &Currency {
        &self.pair.base
    }

    pub fn quote_currency(&self) -> &Currency {
        &self.pair.quote
    }

    /// Currency reserved by this order: quote for BUY, base for SELL
    pub fn lock_currency(&self) -> &Currency {
        match self.order_type {
            OrderType::BUY => &self.pair.quote,
            OrderType::SELL => &self.pair.base,
        }
    }

    /// amount = matched + remaining, status agrees with the fill level
    pub fn check_invariant(&self) -> bool {
        let identity = self.amount == self.matched_amount + self.remaining_amount;
        let status = match self.status {
            OrderStatus::Cancelled => true,
            live => live == OrderStatus::from_fill(self.amount, self.remaining_amount),
        };
        identity && status && self.locked_amount >= Decimal::ZERO
    }

    /// Eligible to be matched or cancelled
    pub fn is_resting(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::PartiallyFilled)
            && !self.remaining_amount.is_zero()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one fill
    ///
    /// `consumed` is the reservation settled by this fill and `released` the
    /// surplus handed back to the owner alongside it.
    pub fn apply_fill(
        &mut self,
        fill: Quantity,
        consumed: Decimal,
        released: Decimal,
        timestamp: i64,
    ) -> Result<(), OrderError> {
        if self.is_terminal() {
            return Err(OrderError::Terminal {
                order_id: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        let remaining = self
            .remaining_amount
            .checked_sub(fill)
            .ok_or_else(|| OrderError::Overfill {
                order_id: self.id.to_string(),
                fill: fill.to_string(),
                remaining: self.remaining_amount.to_string(),
            })?;
        let requested = consumed + released;
        if requested > self.locked_amount {
            return Err(OrderError::ReservationExceeded {
                order_id: self.id.to_string(),
                reserved: self.locked_amount.to_string(),
                requested: requested.to_string(),
            });
        }

        self.matched_amount = self.matched_amount + fill;
        self.remaining_amount = remaining;
        self.locked_amount -= requested;
        self.status = OrderStatus::from_fill(self.amount, self.remaining_amount);
        self.touch(timestamp);
        Ok(())
    }

    /// Cancel a resting order
    ///
    /// Returns the outstanding reservation that the owner gets back.
    pub fn cancel(&mut self, timestamp: i64) -> Result<Decimal, OrderError> {
        if !self.is_resting() {
            return Err(OrderError::NotCancellable {
                order_id: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        let released = self.locked_amount;
        self.locked_amount = Decimal::ZERO;
        self.status = OrderStatus::Cancelled;
        self.touch(timestamp);
        Ok(released)
    }

    fn touch(&mut self, timestamp: i64) {
        self.updated_at = timestamp;
        self.version += 1;
    }
}
