//! Post-run invariant audit
//!
//! Checks the exchange at rest against the properties every interleaving
//! must preserve: no negative balance, funds conserved per currency (fees
//! included), wallet locks equal to open-order reservations, order amount
//! identity, and trade history consistent with order fills.

use matching_engine::Exchange;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use types::ids::OrderId;
use types::market::Currency;
use types::wallet::WalletKey;

/// Total holdings per currency
pub type Supply = BTreeMap<Currency, Decimal>;

/// Sum of available + locked over every wallet
pub fn capture_supply(exchange: &Exchange) -> Supply {
    let mut supply = Supply::new();
    for wallet in exchange.ledger().all_wallets() {
        *supply.entry(wallet.currency.clone()).or_default() += wallet.total();
    }
    supply
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub wallets_checked: usize,
    pub orders_checked: usize,
    pub trades_checked: usize,
    pub violations: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    fn flag(&mut self, violation: String) {
        self.violations.push(violation);
    }
}

pub fn audit(exchange: &Exchange, expected: &Supply) -> AuditReport {
    let mut report = AuditReport::default();

    // ───────────────────────── Wallets ─────────────────────────
    let wallets = exchange.ledger().all_wallets();
    report.wallets_checked = wallets.len();
    for wallet in &wallets {
        if !wallet.check_invariant() {
            report.flag(format!(
                "negative balance on {}/{}: available {} locked {}",
                wallet.user_id, wallet.currency, wallet.available, wallet.locked
            ));
        }
    }
    let actual = capture_supply(exchange);
    let currencies: BTreeSet<&Currency> = expected.keys().chain(actual.keys()).collect();
    for currency in currencies {
        let want = expected.get(currency).copied().unwrap_or_default();
        let have = actual.get(currency).copied().unwrap_or_default();
        if want != have {
            report.flag(format!("{currency} supply changed: {want} -> {have}"));
        }
    }

    // ───────────────────────── Orders ─────────────────────────
    let orders = exchange.orders().snapshot();
    report.orders_checked = orders.len();
    let mut reserved: HashMap<WalletKey, Decimal> = HashMap::new();
    for order in &orders {
        if !order.check_invariant() {
            report.flag(format!(
                "order {} breaks amount identity: {} != {} + {} ({})",
                order.id, order.amount, order.matched_amount, order.remaining_amount, order.status
            ));
        }
        if order.is_resting() {
            let key = WalletKey::new(order.user_id, order.lock_currency().clone());
            *reserved.entry(key).or_default() += order.locked_amount;
        } else if !order.locked_amount.is_zero() {
            report.flag(format!(
                "closed order {} still holds {}",
                order.id, order.locked_amount
            ));
        }
    }
    for wallet in &wallets {
        let want = reserved.get(&wallet.key()).copied().unwrap_or_default();
        if wallet.locked != want {
            report.flag(format!(
                "{}/{} locks {} but open orders reserve {}",
                wallet.user_id, wallet.currency, wallet.locked, want
            ));
        }
    }

    // ───────────────────────── Trades ─────────────────────────
    let trades = exchange.history().replay_history();
    report.trades_checked = trades.len();
    let mut filled: HashMap<OrderId, Decimal> = HashMap::new();
    for (index, trade) in trades.iter().enumerate() {
        if trade.sequence != index as u64 + 1 {
            report.flag(format!("trade {} has sequence {}", index + 1, trade.sequence));
        }
        if !trade.validate_no_self_trade() {
            report.flag(format!("self-trade {} by {}", trade.id, trade.buyer_id));
        }
        *filled.entry(trade.buy_order_id).or_default() += trade.amount.as_decimal();
        *filled.entry(trade.sell_order_id).or_default() += trade.amount.as_decimal();
    }
    for order in &orders {
        let traded = filled.get(&order.id).copied().unwrap_or_default();
        if traded != order.matched_amount.as_decimal() {
            report.flag(format!(
                "order {} matched {} but trades sum to {}",
                order.id, order.matched_amount, traded
            ));
        }
        if traded > order.amount.as_decimal() {
            report.flag(format!("order {} over-filled: {} > {}", order.id, traded, order.amount));
        }
    }

    report
}
