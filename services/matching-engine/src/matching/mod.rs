//! Matching logic module
//!
//! Price compatibility checks and per-fill settlement planning

pub mod crossing;
pub mod executor;

pub use crossing::{can_match, incoming_can_match};
pub use executor::TradePlan;
