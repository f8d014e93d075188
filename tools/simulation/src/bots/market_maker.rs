//! Market maker bot: spread logic, inventory skew, open-order cap
//!
//! Quotes both sides around the mid price. The fee is charged on both
//! sides, so the spread has to exceed twice the fee rate to earn anything.

use super::{Bot, BotOrder};
use matching_engine::{OrderResult, OrderState};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use types::ids::{OrderId, UserId};
use types::order::OrderType;

/// Configuration for the market maker bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMakerConfig {
    /// Spread in basis points (e.g., 10 = 0.10%)
    pub spread_bps: u32,
    /// Size of each quote in base currency
    pub order_size: Decimal,
    /// Maximum absolute net inventory before one side stops quoting
    pub max_inventory: Decimal,
    /// Quotes kept alive; older ones are cancelled
    pub max_open_orders: usize,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            spread_bps: 30,
            order_size: Decimal::new(5, 2),
            max_inventory: Decimal::from(2),
            max_open_orders: 10,
        }
    }
}

/// Market maker bot state.
pub struct MarketMaker {
    pub user_id: UserId,
    pub config: MarketMakerConfig,
    pub net_inventory: Decimal,
    pub orders_placed: usize,
    open: VecDeque<OrderId>,
    rng: ChaCha8Rng,
}

impl MarketMaker {
    /// Create a new market maker with a deterministic seed.
    pub fn new(user_id: UserId, config: MarketMakerConfig, seed: u64) -> Self {
        Self {
            user_id,
            config,
            net_inventory: Decimal::ZERO,
            orders_placed: 0,
            open: VecDeque::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Bid price given mid price and inventory skew.
    ///
    /// When inventory is positive (long), skew bid down to discourage buying.
    pub fn calculate_bid(&self, mid: Decimal) -> Decimal {
        let bid = mid - self.half_spread(mid) - self.inventory_skew(mid);
        if bid > Decimal::ZERO { bid.round_dp(2) } else { Decimal::ONE }
    }

    /// Ask price given mid price and inventory skew.
    pub fn calculate_ask(&self, mid: Decimal) -> Decimal {
        let ask = mid + self.half_spread(mid) - self.inventory_skew(mid);
        if ask > Decimal::ZERO { ask.round_dp(2) } else { Decimal::ONE }
    }

    fn half_spread(&self, mid: Decimal) -> Decimal {
        mid * Decimal::from(self.config.spread_bps) / Decimal::from(20_000)
    }

    /// Positive inventory → positive skew → both quotes lower.
    fn inventory_skew(&self, mid: Decimal) -> Decimal {
        if self.config.max_inventory <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let ratio = self.net_inventory / self.config.max_inventory;
        ratio * self.half_spread(mid)
    }

    /// Quote size jittered by up to ±20%
    fn quote_size(&mut self) -> Decimal {
        let jitter: i64 = self.rng.gen_range(-20..=20);
        let size = self.config.order_size * Decimal::new(100 + jitter, 2);
        size.round_dp(4).max(Decimal::new(1, 4))
    }
}

impl Bot for MarketMaker {
    fn user_id(&self) -> UserId {
        self.user_id
    }

    fn decide(&mut self, mid: Decimal) -> Vec<BotOrder> {
        if mid <= Decimal::ZERO {
            return Vec::new();
        }
        let mut quotes = Vec::with_capacity(2);
        if self.net_inventory < self.config.max_inventory {
            quotes.push(BotOrder {
                side: OrderType::BUY,
                price: self.calculate_bid(mid),
                amount: self.quote_size(),
            });
        }
        if self.net_inventory > -self.config.max_inventory {
            quotes.push(BotOrder {
                side: OrderType::SELL,
                price: self.calculate_ask(mid),
                amount: self.quote_size(),
            });
        }
        self.orders_placed += quotes.len();
        quotes
    }

    fn on_accepted(&mut self, result: &OrderResult) {
        if result.state == OrderState::Resting {
            self.open.push_back(result.order.id);
        }
    }

    fn pending_cancels(&mut self) -> Vec<OrderId> {
        let excess = self.open.len().saturating_sub(self.config.max_open_orders);
        self.open.drain(..excess).collect()
    }

    fn observe_inventory(&mut self, net: Decimal) {
        self.net_inventory = net;
    }
}
