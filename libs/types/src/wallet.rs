//! Wallet balance types
//!
//! One wallet per (user, currency). Both balances are non-negative at all
//! times; a movement that would break this is rejected, never clamped.

use crate::errors::LedgerError;
use crate::ids::UserId;
use crate::market::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Key of a wallet; its ordering is the wallet lock order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WalletKey {
    pub user_id: UserId,
    pub currency: Currency,
}

impl WalletKey {
    pub fn new(user_id: UserId, currency: Currency) -> Self {
        Self { user_id, currency }
    }
}

/// Balance state for a single (user, currency)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub currency: Currency,
    pub available: Decimal,
    pub locked: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: u64,
}

impl Wallet {
    /// Create an empty wallet
    pub fn new(user_id: UserId, currency: Currency, timestamp: i64) -> Self {
        Self {
            user_id,
            currency,
            available: Decimal::ZERO,
            locked: Decimal::ZERO,
            created_at: timestamp,
            updated_at: timestamp,
            version: 0,
        }
    }

    pub fn key(&self) -> WalletKey {
        WalletKey::new(self.user_id, self.currency.clone())
    }

    /// available + locked
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }

    /// Both balances non-negative
    pub fn check_invariant(&self) -> bool {
        self.available >= Decimal::ZERO && self.locked >= Decimal::ZERO
    }

    pub fn has_available(&self, amount: Decimal) -> bool {
        self.available >= amount
    }

    /// Move funds from available to locked
    pub fn lock(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        require_non_negative(amount)?;
        self.require_available(amount)?;
        let locked = self.checked_add(self.locked, amount)?;
        self.available -= amount;
        self.locked = locked;
        Ok(())
    }

    /// Move funds from locked back to available
    pub fn unlock(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        require_non_negative(amount)?;
        self.require_locked(amount)?;
        let available = self.checked_add(self.available, amount)?;
        self.locked -= amount;
        self.available = available;
        Ok(())
    }

    /// Increase available balance (deposit, trade proceeds)
    pub fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        require_non_negative(amount)?;
        self.available = self.checked_add(self.available, amount)?;
        Ok(())
    }

    /// Decrease available balance
    pub fn debit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        require_non_negative(amount)?;
        self.require_available(amount)?;
        self.available -= amount;
        Ok(())
    }

    /// Decrease locked balance (settlement, completed withdrawal)
    pub fn debit_locked(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        require_non_negative(amount)?;
        self.require_locked(amount)?;
        self.locked -= amount;
        Ok(())
    }

    fn require_available(&self, amount: Decimal) -> Result<(), LedgerError> {
        if self.available < amount {
            return Err(LedgerError::InsufficientBalance {
                user_id: self.user_id.to_string(),
                currency: self.currency.to_string(),
                required: amount.to_string(),
                available: self.available.to_string(),
            });
        }
        Ok(())
    }

    fn require_locked(&self, amount: Decimal) -> Result<(), LedgerError> {
        if self.locked < amount {
            return Err(LedgerError::InsufficientLockedBalance {
                user_id: self.user_id.to_string(),
                currency: self.currency.to_string(),
                required: amount.to_string(),
                locked: self.locked.to_string(),
            });
        }
        Ok(())
    }

    fn checked_add(&self, lhs: Decimal, rhs: Decimal) -> Result<Decimal, LedgerError> {
        lhs.checked_add(rhs).ok_or_else(|| LedgerError::Overflow {
            user_id: self.user_id.to_string(),
            currency: self.currency.to_string(),
        })
    }
}

fn require_non_negative(amount: Decimal) -> Result<(), LedgerError> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::InvalidAmount {
            amount: amount.to_string(),
        });
    }
    Ok(())
}
