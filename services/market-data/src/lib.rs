//! Market Data Service
//!
//! Read side of executed matches:
//! - Append-only trade history with monotonic sequence numbers
//! - Per-user trade listings with the viewer's side and fee
//! - Public trade feeds without participant ids
//! - Rolling per-pair statistics (volume, price range, VWAP)
//!
//! ```text
//! MatchingEngine ──record_match──▶ TradeHistory ──▶ user / public / stats
//! ```

pub mod history;
pub mod stats;

pub use history::{PublicTrade, TradeHistory, UserTrade};
pub use stats::{MarketStats, StatsWindow};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
