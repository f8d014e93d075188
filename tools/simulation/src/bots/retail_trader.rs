//! Retail random trader bot
//!
//! Generates random limit orders with deterministic seeded RNG. A share of
//! them is priced through the mid so they take liquidity immediately.

use super::{Bot, BotOrder};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::UserId;
use types::order::OrderType;

/// Configuration for the retail random trader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetailTraderConfig {
    /// Minimum order size
    pub min_size: Decimal,
    /// Maximum order size
    pub max_size: Decimal,
    /// Probability of a marketable order (0.0 to 1.0)
    pub aggressive_ratio: f64,
    /// Maximum distance from mid price for passive orders (in bps)
    pub max_limit_distance_bps: u32,
}

impl Default for RetailTraderConfig {
    fn default() -> Self {
        Self {
            min_size: Decimal::new(1, 3),
            max_size: Decimal::new(2, 2),
            aggressive_ratio: 0.4,
            max_limit_distance_bps: 50,
        }
    }
}

/// Retail random trader with deterministic seeded RNG.
pub struct RetailTrader {
    pub user_id: UserId,
    pub config: RetailTraderConfig,
    pub orders_generated: usize,
    rng: ChaCha8Rng,
}

impl RetailTrader {
    /// Create a new retail trader with a deterministic seed.
    pub fn new(user_id: UserId, config: RetailTraderConfig, seed: u64) -> Self {
        Self {
            user_id,
            config,
            orders_generated: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generate a random order around the mid price.
    ///
    /// Returns None without a positive mid price.
    pub fn generate_order(&mut self, mid: Decimal) -> Option<BotOrder> {
        if mid <= Decimal::ZERO {
            return None;
        }

        let side = if self.rng.gen_bool(0.5) { OrderType::BUY } else { OrderType::SELL };

        let min_f = self.config.min_size.to_f64().unwrap_or(0.001);
        let max_f = self.config.max_size.to_f64().unwrap_or(min_f).max(min_f);
        let size_f: f64 = self.rng.gen_range(min_f..=max_f);
        let amount = Decimal::from_f64(size_f)
            .unwrap_or(self.config.min_size)
            .round_dp(4);
        let amount = if amount <= Decimal::ZERO { self.config.min_size } else { amount };

        let aggressive = self.rng.gen_bool(self.config.aggressive_ratio.clamp(0.0, 1.0));
        let bps: u32 = if aggressive {
            100
        } else {
            self.rng.gen_range(1..=self.config.max_limit_distance_bps.max(1))
        };
        let distance = mid * Decimal::from(bps) / Decimal::from(10_000);
        // aggressive orders cross the mid, passive ones stay on their side
        let price = match (side, aggressive) {
            (OrderType::BUY, true) | (OrderType::SELL, false) => mid + distance,
            (OrderType::SELL, true) | (OrderType::BUY, false) => mid - distance,
        };
        let price = price.round_dp(2);
        let price = if price > Decimal::ZERO { price } else { Decimal::ONE };

        self.orders_generated += 1;
        Some(BotOrder { side, price, amount })
    }
}

impl Bot for RetailTrader {
    fn user_id(&self) -> UserId {
        self.user_id
    }

    fn decide(&mut self, mid: Decimal) -> Vec<BotOrder> {
        self.generate_order(mid).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trader(seed: u64) -> RetailTrader {
        RetailTrader::new(UserId::new(9), RetailTraderConfig::default(), seed)
    }

    #[test]
    fn test_deterministic_output() {
        let mid = dec!(50000);
        let mut t1 = trader(42);
        let mut t2 = trader(42);
        for _ in 0..20 {
            assert_eq!(t1.generate_order(mid), t2.generate_order(mid));
        }
    }

    #[test]
    fn test_order_validity() {
        let mid = dec!(50000);
        let mut t = trader(123);
        for _ in 0..200 {
            let order = t.generate_order(mid).unwrap();
            assert!(order.price > Decimal::ZERO);
            assert!(order.amount >= dec!(0.001) && order.amount <= dec!(0.02));
            assert!(order.price >= dec!(49500) && order.price <= dec!(50500));
        }
        assert_eq!(t.orders_generated, 200);
    }

    #[test]
    fn test_different_seeds_different_output() {
        let mid = dec!(50000);
        let mut t1 = trader(1);
        let mut t2 = trader(2);

        let same = (0..10)
            .filter(|_| t1.generate_order(mid) == t2.generate_order(mid))
            .count();
        assert!(same < 10);
    }

    #[test]
    fn test_no_mid_price_returns_none() {
        let mut t = trader(42);
        assert!(t.generate_order(Decimal::ZERO).is_none());
        assert!(t.decide(Decimal::ZERO).is_empty());
    }
}
