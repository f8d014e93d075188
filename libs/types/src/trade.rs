//! Executed match records
//!
//! A MatchEvent is written once by the matching engine and never mutated or
//! deleted afterwards.

use crate::errors::ValidationError;
use crate::ids::{OrderId, TradeId, UserId};
use crate::market::CurrencyPair;
use crate::numeric::{Price, Quantity};
use crate::order::OrderType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade record
///
/// `price_per_unit` is always the maker's resting price. `buyer_fee` is in
/// quote units, `seller_fee` in base units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub id: TradeId,
    /// Position in the trade history, assigned on append
    pub sequence: u64,

    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,

    pub pair: CurrencyPair,
    pub amount: Quantity,
    pub price_per_unit: Price,
    pub total_value: Decimal,
    pub buyer_fee: Decimal,
    pub seller_fee: Decimal,

    /// Side of the incoming order that triggered the match
    pub taker_side: OrderType,
    pub created_at: i64,
}

impl MatchEvent {
    /// Create an unsequenced match; total_value = amount × price, exactly
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        buyer_id: UserId,
        seller_id: UserId,
        pair: CurrencyPair,
        amount: Quantity,
        price_per_unit: Price,
        buyer_fee: Decimal,
        seller_fee: Decimal,
        taker_side: OrderType,
        timestamp: i64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: TradeId::new(),
            sequence: 0,
            buy_order_id,
            sell_order_id,
            buyer_id,
            seller_id,
            total_value: amount.notional(price_per_unit)?,
            pair,
            amount,
            price_per_unit,
            buyer_fee,
            seller_fee,
            taker_side,
            created_at: timestamp,
        })
    }

    /// Whether `user` took part as buyer or seller
    pub fn involves(&self, user: UserId) -> bool {
        self.buyer_id == user || self.seller_id == user
    }

    /// Side `user` traded on, buyer first if both
    pub fn side_of(&self, user: UserId) -> Option<OrderType> {
        if self.buyer_id == user {
            Some(OrderType::BUY)
        } else if self.seller_id == user {
            Some(OrderType::SELL)
        } else {
            None
        }
    }

    /// Orders on both sides must belong to different users
    pub fn validate_no_self_trade(&self) -> bool {
        self.buyer_id != self.seller_id
    }
}
