//! Trading bots
//!
//! Each bot owns one user and a seeded RNG, so a run is reproducible up to
//! thread interleaving.

pub mod market_maker;
pub mod retail_trader;

use matching_engine::OrderResult;
use rust_decimal::Decimal;
use types::ids::{OrderId, UserId};
use types::order::OrderType;

pub use market_maker::{MarketMaker, MarketMakerConfig};
pub use retail_trader::{RetailTrader, RetailTraderConfig};

/// Limit order a bot wants placed
#[derive(Debug, Clone, PartialEq)]
pub struct BotOrder {
    pub side: OrderType,
    pub price: Decimal,
    pub amount: Decimal,
}

/// Strategy driven by the simulation runner, one tick at a time
pub trait Bot: Send {
    fn user_id(&self) -> UserId;

    /// Orders to place given the current mid price
    fn decide(&mut self, mid: Decimal) -> Vec<BotOrder>;

    /// Called for every accepted order
    fn on_accepted(&mut self, _result: &OrderResult) {}

    /// Orders the bot wants cancelled before its next tick
    fn pending_cancels(&mut self) -> Vec<OrderId> {
        Vec::new()
    }

    /// Net base position change since seeding
    fn observe_inventory(&mut self, _net: Decimal) {}
}
