//! Matching engine service for the custody exchange
//!
//! Limit-order books per currency pair, price-time priority matching at the
//! maker's price, and settlement of every fill through the ledger.
//!
//! **Key Invariants:**
//! - Price-time priority strictly enforced
//! - No self-trades
//! - Funds for a resting order stay reserved until it fills or is cancelled
//! - A fill either settles completely or leaves no trace
//!
//! # Modules
//! - `book`: Bid/ask ladders and FIFO price levels
//! - `matching`: Crossing rules and per-fill settlement plans
//! - `store`: Order records, reservations and cancellation
//! - `engine`: Taker matching loop
//! - `config`: TOML configuration
//! - `exchange`: Facade owning every component

pub mod book;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod matching;
pub mod store;

pub use book::{DepthSnapshot, PairBook};
pub use config::{ConfigError, ExchangeConfig, Limits};
pub use engine::{MatchingEngine, OrderResult, OrderState};
pub use exchange::Exchange;
pub use store::OrderBookStore;
