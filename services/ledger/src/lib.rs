//! Ledger service for the custody exchange
//!
//! Owns every wallet balance and the flows that move funds outside of
//! trading.
//!
//! # Modules
//! - `ledger`: Wallet store and atomic posting batches
//! - `posting`: Balance movements
//! - `transfer`: Internal user-to-user transfers
//! - `payments`: Deposit and withdrawal lifecycle

pub mod ledger;
pub mod payments;
pub mod posting;
pub mod transfer;

pub use ledger::{Ledger, WalletSummary};
pub use payments::{PaymentDesk, PaymentPolicy};
pub use posting::{Entry, Posting, PostingBatch};
pub use transfer::TransferDesk;
