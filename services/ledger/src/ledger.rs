//! Per-user, per-currency balances
//!
//! The ledger is the only component that mutates wallets. Every mutation is
//! a batch of [`Posting`]s executed under the wallet mutexes it touches:
//! - wallet mutexes are always taken in ascending `(user_id, currency)` order
//! - postings are staged on copies and validated before anything is written
//! - on any failure the batch is dropped and no wallet changes
//!
//! Single-wallet primitives (`lock`, `credit`, ...) and `transfer` are thin
//! wrappers over [`Ledger::apply`].

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use types::clock::Clock;
use types::errors::LedgerError;
use types::ids::UserId;
use types::market::{Currency, CurrencyKind, MarketRegistry};
use types::wallet::{Wallet, WalletKey};

use crate::posting::Posting;

type WalletHandle = Arc<Mutex<Wallet>>;

/// Wallets of one user split by currency kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub user_id: UserId,
    pub fiat: Vec<Wallet>,
    pub crypto: Vec<Wallet>,
}

/// Balance store for all users
pub struct Ledger {
    wallets: DashMap<WalletKey, WalletHandle>,
    registry: Arc<MarketRegistry>,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(registry: Arc<MarketRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            wallets: DashMap::new(),
            registry,
            clock,
        }
    }

    pub fn registry(&self) -> &MarketRegistry {
        &self.registry
    }

    // ───────────────────────── Wallets ─────────────────────────

    /// Open a wallet; returns the existing one if already open
    pub fn create_wallet(&self, user_id: UserId, currency: &Currency) -> Result<Wallet, LedgerError> {
        if !self.registry.is_supported(currency) {
            return Err(LedgerError::UnsupportedCurrency(currency.to_string()));
        }
        let key = WalletKey::new(user_id, currency.clone());
        let handle = self
            .wallets
            .entry(key)
            .or_insert_with(|| {
                debug!(user_id = %user_id, currency = %currency, "wallet opened");
                Arc::new(Mutex::new(Wallet::new(
                    user_id,
                    currency.clone(),
                    self.clock.now_nanos(),
                )))
            })
            .value()
            .clone();
        let wallet = handle.lock().clone();
        Ok(wallet)
    }

    /// Open the wallet on first use; no-op when it exists
    pub fn ensure_wallet(&self, user_id: UserId, currency: &Currency) -> Result<(), LedgerError> {
        if self.handle(&WalletKey::new(user_id, currency.clone())).is_some() {
            return Ok(());
        }
        self.create_wallet(user_id, currency).map(|_| ())
    }

    /// Open one wallet per supported currency (user registration)
    pub fn open_default_wallets(&self, user_id: UserId) -> Vec<Wallet> {
        let currencies: Vec<Currency> = self
            .registry
            .currencies()
            .map(|(currency, _)| currency.clone())
            .collect();
        let wallets = currencies
            .iter()
            .filter_map(|currency| self.create_wallet(user_id, currency).ok())
            .collect::<Vec<_>>();
        info!(user_id = %user_id, wallets = wallets.len(), "default wallets opened");
        wallets
    }

    /// Snapshot of one wallet
    pub fn wallet(&self, user_id: UserId, currency: &Currency) -> Option<Wallet> {
        let handle = self.handle(&WalletKey::new(user_id, currency.clone()))?;
        let wallet = handle.lock().clone();
        Some(wallet)
    }

    /// All wallets of a user, ordered by currency
    pub fn user_wallets(&self, user_id: UserId) -> Vec<Wallet> {
        let mut handles: Vec<(WalletKey, WalletHandle)> = self
            .wallets
            .iter()
            .filter(|entry| entry.key().user_id == user_id)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
            .into_iter()
            .map(|(_, handle)| handle.lock().clone())
            .collect()
    }

    pub fn wallet_summary(&self, user_id: UserId) -> WalletSummary {
        let (fiat, crypto) = self
            .user_wallets(user_id)
            .into_iter()
            .partition(|wallet| self.registry.kind(&wallet.currency) == Some(CurrencyKind::Fiat));
        WalletSummary {
            user_id,
            fiat,
            crypto,
        }
    }

    /// available ≥ amount; false for a missing wallet
    pub fn has_sufficient_balance(&self, user_id: UserId, currency: &Currency, amount: Decimal) -> bool {
        self.wallet(user_id, currency)
            .map(|wallet| wallet.has_available(amount))
            .unwrap_or(false)
    }

    // ───────────────────────── Primitives ─────────────────────────

    /// Move `amount` from available to locked
    pub fn lock(&self, user_id: UserId, currency: &Currency, amount: Decimal) -> Result<Wallet, LedgerError> {
        self.apply_one(Posting::lock(user_id, currency, amount))
    }

    /// Move `amount` from locked back to available
    pub fn unlock(&self, user_id: UserId, currency: &Currency, amount: Decimal) -> Result<Wallet, LedgerError> {
        self.apply_one(Posting::unlock(user_id, currency, amount))
    }

    pub fn credit(&self, user_id: UserId, currency: &Currency, amount: Decimal) -> Result<Wallet, LedgerError> {
        self.apply_one(Posting::credit(user_id, currency, amount))
    }

    pub fn debit(&self, user_id: UserId, currency: &Currency, amount: Decimal) -> Result<Wallet, LedgerError> {
        self.apply_one(Posting::debit(user_id, currency, amount))
    }

    pub fn debit_locked(&self, user_id: UserId, currency: &Currency, amount: Decimal) -> Result<Wallet, LedgerError> {
        self.apply_one(Posting::debit_locked(user_id, currency, amount))
    }

    /// Debit `from` and credit `to` as one unit
    ///
    /// Returns the (sender, receiver) wallets after the move.
    pub fn transfer(
        &self,
        from: UserId,
        to: UserId,
        currency: &Currency,
        amount: Decimal,
    ) -> Result<(Wallet, Wallet), LedgerError> {
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        let wallets = self.apply(&[
            Posting::debit(from, currency, amount),
            Posting::credit(to, currency, amount),
        ])?;
        let mut sender = None;
        let mut receiver = None;
        for wallet in wallets {
            if wallet.user_id == from {
                sender = Some(wallet);
            } else {
                receiver = Some(wallet);
            }
        }
        match (sender, receiver) {
            (Some(sender), Some(receiver)) => Ok((sender, receiver)),
            _ => Err(LedgerError::UnknownWallet {
                user_id: to.to_string(),
                currency: currency.to_string(),
            }),
        }
    }

    // ───────────────────────── Batches ─────────────────────────

    /// Apply all postings atomically
    ///
    /// Returns the committed state of every touched wallet, ordered by key.
    pub fn apply(&self, postings: &[Posting]) -> Result<Vec<Wallet>, LedgerError> {
        for posting in postings {
            posting.validate()?;
        }

        let keys: BTreeSet<&WalletKey> = postings.iter().map(|p| &p.key).collect();
        let mut handles: Vec<(&WalletKey, WalletHandle)> = Vec::with_capacity(keys.len());
        for key in keys {
            let handle = self.handle(key).ok_or_else(|| LedgerError::UnknownWallet {
                user_id: key.user_id.to_string(),
                currency: key.currency.to_string(),
            })?;
            handles.push((key, handle));
        }

        // handles are sorted by key, so this is the global lock order
        let mut guards: Vec<MutexGuard<'_, Wallet>> =
            handles.iter().map(|(_, handle)| handle.lock()).collect();
        let mut staged: Vec<Wallet> = guards.iter().map(|guard| (**guard).clone()).collect();

        for posting in postings {
            let index = handles
                .binary_search_by(|(key, _)| (*key).cmp(&posting.key))
                .map_err(|_| LedgerError::UnknownWallet {
                    user_id: posting.key.user_id.to_string(),
                    currency: posting.key.currency.to_string(),
                })?;
            posting.apply_to(&mut staged[index])?;
        }

        let now = self.clock.now_nanos();
        for (guard, wallet) in guards.iter_mut().zip(staged.iter_mut()) {
            wallet.updated_at = now;
            wallet.version += 1;
            **guard = wallet.clone();
        }
        debug!(postings = postings.len(), wallets = staged.len(), "ledger batch committed");
        Ok(staged)
    }

    fn apply_one(&self, posting: Posting) -> Result<Wallet, LedgerError> {
        let key = posting.key.clone();
        self.apply(std::slice::from_ref(&posting))?
            .into_iter()
            .next()
            .ok_or(LedgerError::UnknownWallet {
                user_id: key.user_id.to_string(),
                currency: key.currency.to_string(),
            })
    }

    fn handle(&self, key: &WalletKey) -> Option<WalletHandle> {
        self.wallets.get(key).map(|entry| entry.value().clone())
    }

    /// Every wallet currently held, ordered by key
    pub fn all_wallets(&self) -> Vec<Wallet> {
        let mut handles: Vec<(WalletKey, WalletHandle)> = self
            .wallets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
            .into_iter()
            .map(|(_, handle)| handle.lock().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use types::clock::ManualClock;

    fn currency(code: &str) -> Currency {
        Currency::new(code).unwrap()
    }

    fn setup_ledger() -> Ledger {
        let mut registry = MarketRegistry::new();
        registry.add_currency(currency("USDT"), CurrencyKind::Crypto);
        registry.add_currency(currency("BTC"), CurrencyKind::Crypto);
        registry.add_currency(currency("THB"), CurrencyKind::Fiat);
        Ledger::new(Arc::new(registry), Arc::new(ManualClock::new(1_000)))
    }

    fn funded(ledger: &Ledger, user: u64, code: &str, amount: Decimal) -> UserId {
        let user = UserId::new(user);
        ledger.create_wallet(user, &currency(code)).unwrap();
        ledger.credit(user, &currency(code), amount).unwrap();
        user
    }

    #[test]
    fn test_create_wallet_is_idempotent() {
        let ledger = setup_ledger();
        let user = UserId::new(1);
        let first = ledger.create_wallet(user, &currency("BTC")).unwrap();
        ledger.credit(user, &currency("BTC"), dec!(1)).unwrap();
        let again = ledger.create_wallet(user, &currency("BTC")).unwrap();

        assert_eq!(first.available, Decimal::ZERO);
        assert_eq!(again.available, dec!(1));
    }

    #[test]
    fn test_ensure_wallet_keeps_balance() {
        let ledger = setup_ledger();
        let user = funded(&ledger, 1, "BTC", dec!(2));
        ledger.ensure_wallet(user, &currency("BTC")).unwrap();
        ledger.ensure_wallet(user, &currency("USDT")).unwrap();

        assert_eq!(ledger.wallet(user, &currency("BTC")).unwrap().available, dec!(2));
        assert_eq!(ledger.wallet(user, &currency("USDT")).unwrap().available, Decimal::ZERO);
        assert!(ledger.ensure_wallet(user, &currency("DOGE")).is_err());
    }

    #[test]
    fn test_create_wallet_rejects_unsupported_currency() {
        let ledger = setup_ledger();
        let err = ledger
            .create_wallet(UserId::new(1), &currency("DOGE"))
            .unwrap_err();
        assert_eq!(err, LedgerError::UnsupportedCurrency("DOGE".to_string()));
    }

    #[test]
    fn test_open_default_wallets_and_summary() {
        let ledger = setup_ledger();
        let wallets = ledger.open_default_wallets(UserId::new(9));
        assert_eq!(wallets.len(), 3);

        let summary = ledger.wallet_summary(UserId::new(9));
        assert_eq!(summary.fiat.len(), 1);
        assert_eq!(summary.fiat[0].currency.as_str(), "THB");
        assert_eq!(summary.crypto.len(), 2);
    }

    #[test]
    fn test_lock_moves_funds() {
        let ledger = setup_ledger();
        let user = funded(&ledger, 1, "USDT", dec!(1000));

        let wallet = ledger.lock(user, &currency("USDT"), dec!(600)).unwrap();
        assert_eq!(wallet.available, dec!(400));
        assert_eq!(wallet.locked, dec!(600));
        assert_eq!(wallet.updated_at, 1_000);
    }

    #[test]
    fn test_lock_insufficient_leaves_wallet_untouched() {
        let ledger = setup_ledger();
        let user = funded(&ledger, 1, "USDT", dec!(100));
        let before = ledger.wallet(user, &currency("USDT")).unwrap();

        let err = ledger.lock(user, &currency("USDT"), dec!(100.5)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.wallet(user, &currency("USDT")).unwrap(), before);
    }

    #[test]
    fn test_unlock_requires_locked_funds() {
        let ledger = setup_ledger();
        let user = funded(&ledger, 1, "USDT", dec!(100));
        ledger.lock(user, &currency("USDT"), dec!(30)).unwrap();

        let err = ledger.unlock(user, &currency("USDT"), dec!(31)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientLockedBalance { .. }));

        let wallet = ledger.unlock(user, &currency("USDT"), dec!(30)).unwrap();
        assert_eq!(wallet.available, dec!(100));
        assert_eq!(wallet.locked, Decimal::ZERO);
    }

    #[test]
    fn test_credit_must_be_positive() {
        let ledger = setup_ledger();
        let user = funded(&ledger, 1, "USDT", dec!(1));
        let err = ledger.credit(user, &currency("USDT"), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));
    }

    #[test]
    fn test_primitives_on_missing_wallet() {
        let ledger = setup_ledger();
        let err = ledger
            .credit(UserId::new(5), &currency("BTC"), dec!(1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownWallet { .. }));
        assert!(!ledger.has_sufficient_balance(UserId::new(5), &currency("BTC"), dec!(0)));
    }

    #[test]
    fn test_transfer_moves_funds() {
        let ledger = setup_ledger();
        let x = funded(&ledger, 1, "USDT", dec!(50));
        let y = funded(&ledger, 2, "USDT", dec!(10));

        let (sender, receiver) = ledger.transfer(x, y, &currency("USDT"), dec!(50)).unwrap();
        assert_eq!(sender.available, Decimal::ZERO);
        assert_eq!(receiver.available, dec!(60));
    }

    #[test]
    fn test_transfer_failures_have_no_effect() {
        let ledger = setup_ledger();
        let x = funded(&ledger, 1, "USDT", dec!(50));
        let y = funded(&ledger, 2, "USDT", dec!(0.5));

        let err = ledger.transfer(x, x, &currency("USDT"), dec!(1)).unwrap_err();
        assert_eq!(err, LedgerError::SelfTransfer);

        let err = ledger.transfer(x, y, &currency("USDT"), dec!(51)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        let err = ledger
            .transfer(x, UserId::new(77), &currency("USDT"), dec!(1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownWallet { .. }));

        assert_eq!(ledger.wallet(x, &currency("USDT")).unwrap().available, dec!(50));
        assert_eq!(ledger.wallet(y, &currency("USDT")).unwrap().available, dec!(0.5));
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let ledger = setup_ledger();
        let a = funded(&ledger, 1, "USDT", dec!(100));
        let b = funded(&ledger, 2, "BTC", dec!(1));
        ledger.create_wallet(a, &currency("BTC")).unwrap();

        let postings = [
            Posting::credit(a, &currency("BTC"), dec!(0.5)),
            Posting::debit(a, &currency("USDT"), dec!(50)),
            // b has no locked BTC, so the whole batch must fail
            Posting::debit_locked(b, &currency("BTC"), dec!(0.5)),
        ];
        let err = ledger.apply(&postings).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientLockedBalance { .. }));

        assert_eq!(ledger.wallet(a, &currency("BTC")).unwrap().available, Decimal::ZERO);
        assert_eq!(ledger.wallet(a, &currency("USDT")).unwrap().available, dec!(100));
        assert_eq!(ledger.wallet(b, &currency("BTC")).unwrap().version, 1);
    }

    #[test]
    fn test_batch_postings_on_same_wallet_compose() {
        let ledger = setup_ledger();
        let user = funded(&ledger, 1, "USDT", dec!(10));

        let wallets = ledger
            .apply(&[
                Posting::lock(user, &currency("USDT"), dec!(10)),
                Posting::debit_locked(user, &currency("USDT"), dec!(4)),
                Posting::unlock(user, &currency("USDT"), dec!(6)),
            ])
            .unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].available, dec!(6));
        assert_eq!(wallets[0].locked, Decimal::ZERO);
    }

    #[test]
    fn test_user_wallets_sorted() {
        let ledger = setup_ledger();
        let user = UserId::new(3);
        ledger.create_wallet(user, &currency("USDT")).unwrap();
        ledger.create_wallet(user, &currency("BTC")).unwrap();
        ledger.create_wallet(UserId::new(4), &currency("BTC")).unwrap();

        let codes: Vec<String> = ledger
            .user_wallets(user)
            .into_iter()
            .map(|w| w.currency.to_string())
            .collect();
        assert_eq!(codes, vec!["BTC", "USDT"]);
        assert_eq!(ledger.all_wallets().len(), 3);
    }
}
