//! Balance postings
//!
//! A posting is one movement on one wallet. The ledger applies a slice of
//! postings as a single unit: all of them commit or none do.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::errors::LedgerError;
use types::ids::UserId;
use types::market::Currency;
use types::wallet::{Wallet, WalletKey};

/// Kind of balance movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Entry {
    /// available += amount
    Credit,
    /// available -= amount
    Debit,
    /// available -= amount, locked += amount
    Lock,
    /// locked -= amount, available += amount
    Unlock,
    /// locked -= amount
    DebitLocked,
}

/// One movement on one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub key: WalletKey,
    pub entry: Entry,
    pub amount: Decimal,
}

impl Posting {
    pub fn new(user_id: UserId, currency: &Currency, entry: Entry, amount: Decimal) -> Self {
        Self {
            key: WalletKey::new(user_id, currency.clone()),
            entry,
            amount,
        }
    }

    pub fn credit(user_id: UserId, currency: &Currency, amount: Decimal) -> Self {
        Self::new(user_id, currency, Entry::Credit, amount)
    }

    pub fn debit(user_id: UserId, currency: &Currency, amount: Decimal) -> Self {
        Self::new(user_id, currency, Entry::Debit, amount)
    }

    pub fn lock(user_id: UserId, currency: &Currency, amount: Decimal) -> Self {
        Self::new(user_id, currency, Entry::Lock, amount)
    }

    pub fn unlock(user_id: UserId, currency: &Currency, amount: Decimal) -> Self {
        Self::new(user_id, currency, Entry::Unlock, amount)
    }

    pub fn debit_locked(user_id: UserId, currency: &Currency, amount: Decimal) -> Self {
        Self::new(user_id, currency, Entry::DebitLocked, amount)
    }

    /// Amount must be strictly positive
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount {
                amount: self.amount.to_string(),
            });
        }
        Ok(())
    }

    /// Apply to a staged copy of the wallet
    pub(crate) fn apply_to(&self, wallet: &mut Wallet) -> Result<(), LedgerError> {
        match self.entry {
            Entry::Credit => wallet.credit(self.amount),
            Entry::Debit => wallet.debit(self.amount),
            Entry::Lock => wallet.lock(self.amount),
            Entry::Unlock => wallet.unlock(self.amount),
            Entry::DebitLocked => wallet.debit_locked(self.amount),
        }
    }
}

/// Accumulates postings, dropping zero-amount movements
#[derive(Debug, Clone, Default)]
pub struct PostingBatch {
    postings: Vec<Posting>,
}

impl PostingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, user_id: UserId, currency: &Currency, entry: Entry, amount: Decimal) {
        if !amount.is_zero() {
            self.postings.push(Posting::new(user_id, currency, entry, amount));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn as_slice(&self) -> &[Posting] {
        &self.postings
    }
}
