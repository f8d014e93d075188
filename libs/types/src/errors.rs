//! Error types for the exchange core
//!
//! Comprehensive error taxonomy using thiserror. Every rejection maps to a
//! stable [`ErrorKind`] code plus a human-readable message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level exchange error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

impl ExchangeError {
    /// Stable error kind for callers that branch on failures
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::Validation(_) => ErrorKind::Validation,
            ExchangeError::Ledger(e) => e.kind(),
            ExchangeError::Order(e) => e.kind(),
            ExchangeError::Settlement(_) => ErrorKind::SettlementFailure,
            ExchangeError::Payment(e) => e.kind(),
        }
    }
}

/// Stable, serializable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    InsufficientBalance,
    InsufficientLockedBalance,
    UnknownWallet,
    SelfTransfer,
    OrderNotFound,
    NotCancellable,
    SettlementFailure,
    NotFound,
    InvalidState,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorKind::InsufficientLockedBalance => "INSUFFICIENT_LOCKED_BALANCE",
            ErrorKind::UnknownWallet => "UNKNOWN_WALLET",
            ErrorKind::SelfTransfer => "SELF_TRANSFER",
            ErrorKind::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorKind::NotCancellable => "NOT_CANCELLABLE",
            ErrorKind::SettlementFailure => "SETTLEMENT_FAILURE",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Bad input, rejected before any state change
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Amount must be positive: {0}")]
    NonPositiveAmount(String),

    #[error("Price must be positive: {0}")]
    NonPositivePrice(String),

    #[error("Too many decimal places in {value} (max {max})")]
    ScaleTooLarge { value: String, max: u32 },

    #[error("Invalid currency code: {0}")]
    InvalidCurrencyCode(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Unsupported currency pair: {0}")]
    UnsupportedPair(String),

    #[error("Minimum {currency} deposit is {minimum}")]
    BelowMinimum { currency: String, minimum: String },

    #[error("Only fiat deposits are accepted, got {0}")]
    NotFiat(String),

    #[error("Value of {0} is out of range or not exactly representable")]
    ValueOutOfRange(String),
}

/// Wallet balance errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient {currency} balance for user {user_id}: required {required}, available {available}")]
    InsufficientBalance {
        user_id: String,
        currency: String,
        required: String,
        available: String,
    },

    #[error("Insufficient locked {currency} balance for user {user_id}: required {required}, locked {locked}")]
    InsufficientLockedBalance {
        user_id: String,
        currency: String,
        required: String,
        locked: String,
    },

    #[error("Wallet not found: user {user_id}, currency {currency}")]
    UnknownWallet { user_id: String, currency: String },

    #[error("Cannot transfer to yourself")]
    SelfTransfer,

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: String },

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Balance overflow for user {user_id}, currency {currency}")]
    Overflow { user_id: String, currency: String },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LedgerError::InsufficientLockedBalance { .. } => ErrorKind::InsufficientLockedBalance,
            LedgerError::UnknownWallet { .. } => ErrorKind::UnknownWallet,
            LedgerError::SelfTransfer => ErrorKind::SelfTransfer,
            LedgerError::InvalidAmount { .. } | LedgerError::UnsupportedCurrency(_) => {
                ErrorKind::Validation
            }
            LedgerError::Overflow { .. } => ErrorKind::Internal,
        }
    }
}

/// Order lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Order not found: {order_id}")]
    NotFound { order_id: String },

    #[error("Order {order_id} cannot be cancelled in status {status}")]
    NotCancellable { order_id: String, status: String },

    #[error("Order {order_id} is terminal ({status})")]
    Terminal { order_id: String, status: String },

    #[error("Fill of {fill} exceeds remaining {remaining} on order {order_id}")]
    Overfill {
        order_id: String,
        fill: String,
        remaining: String,
    },

    #[error("Order {order_id} reservation {reserved} cannot cover {requested}")]
    ReservationExceeded {
        order_id: String,
        reserved: String,
        requested: String,
    },
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::NotFound { .. } => ErrorKind::OrderNotFound,
            OrderError::NotCancellable { .. } => ErrorKind::NotCancellable,
            OrderError::Terminal { .. }
            | OrderError::Overfill { .. }
            | OrderError::ReservationExceeded { .. } => ErrorKind::Internal,
        }
    }
}

/// Trade execution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    /// The trade was rolled back in full; trades committed before it stand
    #[error("Settlement failed between taker {taker_order_id} and maker {maker_order_id} after {trades_executed} trade(s): {reason}")]
    SettlementFailure {
        taker_order_id: String,
        maker_order_id: String,
        trades_executed: usize,
        reason: String,
    },
}

/// Deposit / withdrawal lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Payment not found: {payment_id}")]
    NotFound { payment_id: String },

    #[error("Payment {payment_id} cannot move from {from} to {to}")]
    InvalidState {
        payment_id: String,
        from: String,
        to: String,
    },
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::NotFound { .. } => ErrorKind::NotFound,
            PaymentError::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }
}
