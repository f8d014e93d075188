//! Deposits and withdrawals
//!
//! Lifecycle: `request → PENDING → (PROCESSING) → COMPLETED | FAILED | CANCELLED`
//!
//! - a deposit has no balance effect until it completes, then credits the user
//! - a withdrawal locks its amount at request time; completion consumes the
//!   locked funds, failure or cancellation returns them
//!
//! The external payment gateway drives `mark_processing` and `settle`; users
//! may only cancel while a request is still PENDING. The ledger effect and
//! the status change happen under the record's mutex, so a request is
//! settled at most once.

use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use types::clock::Clock;
use types::errors::{ExchangeError, PaymentError, ValidationError};
use types::ids::{PaymentId, UserId};
use types::market::{Currency, CurrencyKind};
use types::query::DEFAULT_USER_LIMIT;

use crate::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentKind {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Final status reported by the gateway or an administrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentOutcome {
    Completed,
    Failed,
    Cancelled,
}

impl From<PaymentOutcome> for PaymentStatus {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Completed => PaymentStatus::Completed,
            PaymentOutcome::Failed => PaymentStatus::Failed,
            PaymentOutcome::Cancelled => PaymentStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub user_id: UserId,
    pub kind: PaymentKind,
    pub currency: Currency,
    pub amount: Decimal,
    /// Payment provider for deposits, destination for withdrawals
    pub reference: String,
    pub status: PaymentStatus,
    pub admin_id: Option<UserId>,
    pub admin_notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentFilter {
    pub kind: Option<PaymentKind>,
    pub currency: Option<Currency>,
    pub status: Option<PaymentStatus>,
    pub limit: Option<usize>,
}

impl PaymentFilter {
    fn matches(&self, record: &PaymentRecord) -> bool {
        self.kind.map_or(true, |k| record.kind == k)
            && self.currency.as_ref().map_or(true, |c| &record.currency == c)
            && self.status.map_or(true, |s| record.status == s)
    }
}

/// Deposit minimums per currency and listing page size
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPolicy {
    pub min_deposits: BTreeMap<Currency, Decimal>,
    pub default_limit: usize,
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        let mut min_deposits = BTreeMap::new();
        if let Ok(thb) = Currency::new("THB") {
            min_deposits.insert(thb, Decimal::from(100));
        }
        if let Ok(usd) = Currency::new("USD") {
            min_deposits.insert(usd, Decimal::from(10));
        }
        Self {
            min_deposits,
            default_limit: DEFAULT_USER_LIMIT,
        }
    }
}

pub struct PaymentDesk {
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
    policy: PaymentPolicy,
    records: DashMap<PaymentId, Arc<Mutex<PaymentRecord>>>,
}

impl PaymentDesk {
    pub fn new(ledger: Arc<Ledger>, clock: Arc<dyn Clock>, policy: PaymentPolicy) -> Self {
        Self {
            ledger,
            clock,
            policy,
            records: DashMap::new(),
        }
    }

    // ───────────────────────── Requests ─────────────────────────

    /// Register a fiat deposit awaiting the payment provider
    pub fn request_deposit(
        &self,
        user: UserId,
        currency: &Currency,
        amount: Decimal,
        provider: impl Into<String>,
    ) -> Result<PaymentRecord, ExchangeError> {
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(amount.to_string()).into());
        }
        if self.ledger.registry().ensure_currency(currency)? != CurrencyKind::Fiat {
            return Err(ValidationError::NotFiat(currency.to_string()).into());
        }
        if let Some(minimum) = self.policy.min_deposits.get(currency) {
            if amount < *minimum {
                return Err(ValidationError::BelowMinimum {
                    currency: currency.to_string(),
                    minimum: minimum.to_string(),
                }
                .into());
            }
        }
        self.ledger.create_wallet(user, currency)?;
        Ok(self.insert(user, PaymentKind::Deposit, currency, amount, provider.into()))
    }

    /// Lock funds and register a withdrawal
    pub fn request_withdrawal(
        &self,
        user: UserId,
        currency: &Currency,
        amount: Decimal,
        destination: impl Into<String>,
    ) -> Result<PaymentRecord, ExchangeError> {
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(amount.to_string()).into());
        }
        self.ledger.registry().ensure_currency(currency)?;
        self.ledger.lock(user, currency, amount)?;
        Ok(self.insert(user, PaymentKind::Withdrawal, currency, amount, destination.into()))
    }

    // ───────────────────────── Transitions ─────────────────────────

    /// PENDING → PROCESSING
    pub fn mark_processing(&self, id: PaymentId) -> Result<PaymentRecord, ExchangeError> {
        let handle = self.handle(id)?;
        let mut record = handle.lock();
        if record.status != PaymentStatus::Pending {
            return Err(invalid_state(&record, PaymentStatus::Processing).into());
        }
        record.status = PaymentStatus::Processing;
        record.updated_at = self.clock.now_nanos();
        Ok(record.clone())
    }

    /// Apply the final outcome of an open request
    pub fn settle(
        &self,
        id: PaymentId,
        admin: UserId,
        outcome: PaymentOutcome,
        notes: Option<String>,
    ) -> Result<PaymentRecord, ExchangeError> {
        let handle = self.handle(id)?;
        let mut record = handle.lock();
        let target = PaymentStatus::from(outcome);
        if !record.status.is_open() {
            return Err(invalid_state(&record, target).into());
        }

        self.apply_effect(&record, target)?;

        let now = self.clock.now_nanos();
        record.status = target;
        record.admin_id = Some(admin);
        record.admin_notes = notes;
        record.updated_at = now;
        if target == PaymentStatus::Completed {
            record.completed_at = Some(now);
        }
        info!(
            payment_id = %record.id,
            kind = ?record.kind,
            status = %record.status,
            amount = %record.amount,
            "payment settled"
        );
        Ok(record.clone())
    }

    /// User-initiated cancellation of a PENDING request
    pub fn cancel(&self, id: PaymentId, user: UserId) -> Result<PaymentRecord, ExchangeError> {
        let handle = self.handle(id)?;
        let mut record = handle.lock();
        if record.user_id != user {
            return Err(not_found(id).into());
        }
        if record.status != PaymentStatus::Pending {
            return Err(invalid_state(&record, PaymentStatus::Cancelled).into());
        }
        self.apply_effect(&record, PaymentStatus::Cancelled)?;
        record.status = PaymentStatus::Cancelled;
        record.updated_at = self.clock.now_nanos();
        Ok(record.clone())
    }

    fn apply_effect(&self, record: &PaymentRecord, target: PaymentStatus) -> Result<(), ExchangeError> {
        let result = match (record.kind, target) {
            (PaymentKind::Deposit, PaymentStatus::Completed) => self
                .ledger
                .credit(record.user_id, &record.currency, record.amount)
                .map(|_| ()),
            (PaymentKind::Withdrawal, PaymentStatus::Completed) => self
                .ledger
                .debit_locked(record.user_id, &record.currency, record.amount)
                .map(|_| ()),
            (PaymentKind::Withdrawal, PaymentStatus::Failed | PaymentStatus::Cancelled) => self
                .ledger
                .unlock(record.user_id, &record.currency, record.amount)
                .map(|_| ()),
            _ => Ok(()),
        };
        if let Err(e) = &result {
            warn!(payment_id = %record.id, error = %e, "payment ledger effect rejected");
        }
        result.map_err(ExchangeError::from)
    }

    // ───────────────────────── Queries ─────────────────────────

    /// `user`'s requests, newest first
    pub fn user_payments(&self, user: UserId, filter: &PaymentFilter) -> Vec<PaymentRecord> {
        let handles: Vec<Arc<Mutex<PaymentRecord>>> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut records: Vec<PaymentRecord> = handles
            .iter()
            .map(|handle| handle.lock().clone())
            .filter(|r| r.user_id == user && filter.matches(r))
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        records.truncate(filter.limit.unwrap_or(self.policy.default_limit));
        records
    }

    /// Look up a request; with `user` set, only its owner can see it
    pub fn payment_by_id(&self, id: PaymentId, user: Option<UserId>) -> Result<PaymentRecord, PaymentError> {
        let handle = self.handle(id)?;
        let record = handle.lock().clone();
        match user {
            Some(user) if user != record.user_id => Err(not_found(id)),
            _ => Ok(record),
        }
    }

    fn insert(
        &self,
        user: UserId,
        kind: PaymentKind,
        currency: &Currency,
        amount: Decimal,
        reference: String,
    ) -> PaymentRecord {
        let now = self.clock.now_nanos();
        let record = PaymentRecord {
            id: PaymentId::new(),
            user_id: user,
            kind,
            currency: currency.clone(),
            amount,
            reference,
            status: PaymentStatus::Pending,
            admin_id: None,
            admin_notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.records
            .insert(record.id, Arc::new(Mutex::new(record.clone())));
        info!(payment_id = %record.id, user_id = %user, kind = ?kind, amount = %amount, "payment requested");
        record
    }

    fn handle(&self, id: PaymentId) -> Result<Arc<Mutex<PaymentRecord>>, PaymentError> {
        self.records
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| not_found(id))
    }
}

fn not_found(id: PaymentId) -> PaymentError {
    PaymentError::NotFound {
        payment_id: id.to_string(),
    }
}

fn invalid_state(record: &PaymentRecord, to: PaymentStatus) -> PaymentError {
    PaymentError::InvalidState {
        payment_id: record.id.to_string(),
        from: record.status.to_string(),
        to: to.to_string(),
    }
}
