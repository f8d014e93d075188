//! Internal transfers between users
//!
//! The balance move goes through [`Ledger::transfer`]; a record is appended
//! only after it commits, so every record corresponds to a completed move.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use types::clock::Clock;
use types::errors::{ExchangeError, LedgerError, ValidationError};
use types::ids::{TransferId, UserId};
use types::market::Currency;
use types::query::DEFAULT_USER_LIMIT;

use crate::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    Success,
}

/// Completed internal transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalTransfer {
    pub id: TransferId,
    pub from_user: UserId,
    pub to_user: UserId,
    pub currency: Currency,
    pub amount: Decimal,
    pub status: TransferStatus,
    pub note: String,
    pub created_at: i64,
}

/// Which end of a transfer the viewing user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferView {
    #[serde(flatten)]
    pub transfer: InternalTransfer,
    pub direction: TransferDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferFilter {
    pub currency: Option<Currency>,
    pub limit: Option<usize>,
}

pub struct TransferDesk {
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
    records: RwLock<Vec<InternalTransfer>>,
}

impl TransferDesk {
    pub fn new(ledger: Arc<Ledger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            clock,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Move `amount` of `currency` from one user to another
    pub fn execute_transfer(
        &self,
        from: UserId,
        to: UserId,
        currency: &Currency,
        amount: Decimal,
        note: impl Into<String>,
    ) -> Result<InternalTransfer, ExchangeError> {
        if from == to {
            return Err(LedgerError::SelfTransfer.into());
        }
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(amount.to_string()).into());
        }
        self.ledger.registry().ensure_currency(currency)?;

        self.ledger.transfer(from, to, currency, amount)?;

        let record = InternalTransfer {
            id: TransferId::new(),
            from_user: from,
            to_user: to,
            currency: currency.clone(),
            amount,
            status: TransferStatus::Success,
            note: note.into(),
            created_at: self.clock.now_nanos(),
        };
        self.records.write().push(record.clone());
        info!(
            transfer_id = %record.id,
            from = %from,
            to = %to,
            currency = %currency,
            amount = %amount,
            "internal transfer completed"
        );
        Ok(record)
    }

    /// Transfers sent or received by `user`, newest first
    pub fn user_transfers(&self, user: UserId, filter: &TransferFilter) -> Vec<TransferView> {
        let limit = filter.limit.unwrap_or(DEFAULT_USER_LIMIT);
        self.records
            .read()
            .iter()
            .rev()
            .filter(|t| filter.currency.as_ref().map_or(true, |c| &t.currency == c))
            .filter_map(|t| {
                let direction = if t.from_user == user {
                    TransferDirection::Sent
                } else if t.to_user == user {
                    TransferDirection::Received
                } else {
                    return None;
                };
                Some(TransferView {
                    transfer: t.clone(),
                    direction,
                })
            })
            .take(limit)
            .collect()
    }

    /// A transfer is only visible to its two parties
    pub fn transfer_by_id(&self, id: TransferId, user: UserId) -> Option<InternalTransfer> {
        self.records
            .read()
            .iter()
            .find(|t| t.id == id && (t.from_user == user || t.to_user == user))
            .cloned()
    }
}
