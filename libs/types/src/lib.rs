//! Types library for the custody exchange
//!
//! Core type definitions shared by the ledger, order book, matching engine
//! and trade history.
//!
//! # Modules
//! - `ids`: Identifiers (UserId, OrderId, TradeId, TransferId, PaymentId)
//! - `market`: Currencies, pairs and the pair validity table
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `wallet`: Per-user, per-currency balances
//! - `order`: Trade order lifecycle
//! - `trade`: Executed match records
//! - `fee`: Fee schedule
//! - `query`: Typed filters and query clauses
//! - `clock`: Injected time source
//! - `errors`: Error taxonomy

pub mod clock;
pub mod errors;
pub mod fee;
pub mod ids;
pub mod market;
pub mod numeric;
pub mod order;
pub mod query;
pub mod trade;
pub mod wallet;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::errors::*;
    pub use crate::fee::*;
    pub use crate::ids::*;
    pub use crate::market::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::query::*;
    pub use crate::trade::*;
    pub use crate::wallet::*;
}
