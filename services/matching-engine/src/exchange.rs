//! Exchange facade
//!
//! Wires ledger, order book store, matching engine, trade history, transfer
//! and payment desks from one [`ExchangeConfig`]. This is the surface the
//! HTTP/auth layer calls; every call carries an already authenticated user.

use std::sync::Arc;
use tracing::info;
use rust_decimal::Decimal;
use types::clock::{Clock, SystemClock};
use types::errors::ExchangeError;
use types::ids::{OrderId, TradeId, UserId};
use types::market::{Currency, CurrencyPair};
use types::order::{OrderType, TradeOrder};
use types::query::{OrderFilter, TradeFilter};
use types::trade::MatchEvent;
use types::wallet::Wallet;

use ledger::{Ledger, PaymentDesk, TransferDesk};
use market_data::{MarketStats, PublicTrade, StatsWindow, TradeHistory, UserTrade};

use crate::book::DepthSnapshot;
use crate::config::{ConfigError, ExchangeConfig};
use crate::engine::{MatchingEngine, OrderResult};
use crate::store::OrderBookStore;

pub struct Exchange {
    config: ExchangeConfig,
    clock: Arc<dyn Clock>,
    ledger: Arc<Ledger>,
    store: Arc<OrderBookStore>,
    history: Arc<TradeHistory>,
    engine: MatchingEngine,
    transfers: TransferDesk,
    payments: PaymentDesk,
}

impl Exchange {
    pub fn new(config: ExchangeConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = Arc::new(config.registry()?);
        let ledger = Arc::new(Ledger::new(registry, clock.clone()));
        let store = Arc::new(OrderBookStore::new(
            ledger.clone(),
            config.fee_schedule(),
            clock.clone(),
        ));
        let history = Arc::new(TradeHistory::new());
        let engine = MatchingEngine::new(
            ledger.clone(),
            store.clone(),
            history.clone(),
            config.fee_account,
            clock.clone(),
        );
        let transfers = TransferDesk::new(ledger.clone(), clock.clone());
        let payments = PaymentDesk::new(ledger.clone(), clock.clone(), config.payment_policy());

        if let Some(account) = config.fee_account {
            ledger.open_default_wallets(account);
        }
        info!(
            fee_rate = %config.fee_rate,
            currencies = config.currencies.len(),
            pairs = config.pairs.len(),
            "exchange started"
        );

        Ok(Self {
            config,
            clock,
            ledger,
            store,
            history,
            engine,
            transfers,
            payments,
        })
    }

    pub fn with_system_clock(config: ExchangeConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Open one wallet per supported currency
    pub fn register_user(&self, user_id: UserId) -> Vec<Wallet> {
        self.ledger.open_default_wallets(user_id)
    }

    // ───────────────────────── Orders ─────────────────────────

    pub fn submit_order(
        &self,
        user_id: UserId,
        order_type: OrderType,
        base: &Currency,
        quote: &Currency,
        amount: Decimal,
        price_per_unit: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        let pair = CurrencyPair::new(base.clone(), quote.clone());
        self.engine
            .submit_order(user_id, order_type, pair, amount, price_per_unit)
    }

    pub fn cancel_order(&self, order_id: OrderId, user_id: UserId) -> Result<TradeOrder, ExchangeError> {
        self.store.cancel_order(order_id, user_id)
    }

    pub fn open_orders(&self, filter: &OrderFilter) -> Vec<TradeOrder> {
        self.store.open_orders(filter)
    }

    pub fn user_orders(&self, user_id: UserId, filter: &OrderFilter) -> Vec<TradeOrder> {
        let mut filter = filter.clone();
        filter.limit.get_or_insert(self.config.limits.user_orders);
        self.store.user_orders(user_id, &filter)
    }

    pub fn order_by_id(&self, order_id: OrderId, user_id: Option<UserId>) -> Result<TradeOrder, ExchangeError> {
        Ok(self.store.order_by_id(order_id, user_id)?)
    }

    /// An order and the trades that filled it, oldest first
    pub fn order_fills(
        &self,
        order_id: OrderId,
        user_id: Option<UserId>,
    ) -> Result<(TradeOrder, Vec<MatchEvent>), ExchangeError> {
        let order = self.store.order_by_id(order_id, user_id)?;
        let trades = self.history.trades_for_order(order.id);
        Ok((order, trades))
    }

    pub fn order_book(&self, base: &Currency, quote: &Currency, levels: usize) -> DepthSnapshot {
        self.store
            .depth(&CurrencyPair::new(base.clone(), quote.clone()), levels)
    }

    // ───────────────────────── Trades ─────────────────────────

    pub fn user_trades(&self, user_id: UserId, filter: &TradeFilter) -> Vec<UserTrade> {
        let mut filter = filter.clone();
        filter.limit.get_or_insert(self.config.limits.user_trades);
        self.history.get_user_trades(user_id, &filter)
    }

    /// A trade `user_id` took part in
    pub fn trade_by_id(&self, trade_id: TradeId, user_id: UserId) -> Option<MatchEvent> {
        self.history
            .get_by_id(trade_id)
            .filter(|trade| trade.involves(user_id))
    }

    pub fn public_trades(&self, base: &Currency, quote: &Currency, limit: Option<usize>) -> Vec<PublicTrade> {
        let pair = CurrencyPair::new(base.clone(), quote.clone());
        let limit = limit.unwrap_or(self.config.limits.public_trades);
        self.history.get_public_trades(&pair, Some(limit))
    }

    /// Statistics over the configured window ending now
    pub fn market_stats(&self, base: &Currency, quote: &Currency) -> MarketStats {
        let pair = CurrencyPair::new(base.clone(), quote.clone());
        let window = StatsWindow::from_secs(self.config.limits.stats_window_secs);
        self.history
            .get_market_stats(&pair, window, self.clock.now_nanos())
    }

    // ───────────────────────── Components ─────────────────────────

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn orders(&self) -> &Arc<OrderBookStore> {
        &self.store
    }

    pub fn history(&self) -> &Arc<TradeHistory> {
        &self.history
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn transfers(&self) -> &TransferDesk {
        &self.transfers
    }

    pub fn payments(&self) -> &PaymentDesk {
        &self.payments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::payments::{PaymentKind, PaymentOutcome, PaymentStatus};
    use rust_decimal_macros::dec;
    use types::clock::{ManualClock, NANOS_PER_SEC};
    use types::order::OrderStatus;

    fn currency(code: &str) -> Currency {
        Currency::new(code).unwrap()
    }

    fn exchange() -> (Arc<ManualClock>, Exchange) {
        let clock = Arc::new(ManualClock::new(NANOS_PER_SEC));
        let config = ExchangeConfig {
            fee_account: Some(UserId::new(1)),
            ..ExchangeConfig::default()
        };
        let exchange = Exchange::new(config, clock.clone()).unwrap();
        (clock, exchange)
    }

    #[test]
    fn test_register_opens_every_wallet() {
        let (_, exchange) = exchange();
        let wallets = exchange.register_user(UserId::new(10));
        assert_eq!(wallets.len(), 7);
        let summary = exchange.ledger().wallet_summary(UserId::new(10));
        assert_eq!(summary.fiat.len(), 2);
        assert_eq!(summary.crypto.len(), 5);
    }

    #[test]
    fn test_deposit_trade_and_fee_collection() {
        let (clock, exchange) = exchange();
        let thb = currency("THB");
        let btc = currency("BTC");
        let alice = UserId::new(10);
        let bob = UserId::new(11);
        exchange.register_user(alice);
        exchange.register_user(bob);

        let deposit = exchange
            .payments()
            .request_deposit(alice, &thb, dec!(2000000), "bank")
            .unwrap();
        assert_eq!(deposit.kind, PaymentKind::Deposit);
        let settled = exchange
            .payments()
            .settle(deposit.id, UserId::new(999), PaymentOutcome::Completed, None)
            .unwrap();
        assert_eq!(settled.status, PaymentStatus::Completed);
        exchange.ledger().credit(bob, &btc, dec!(1)).unwrap();

        clock.advance(NANOS_PER_SEC);
        let ask = exchange
            .submit_order(bob, OrderType::SELL, &btc, &thb, dec!(1), dec!(1000000))
            .unwrap();
        clock.advance(NANOS_PER_SEC);
        let bid = exchange
            .submit_order(alice, OrderType::BUY, &btc, &thb, dec!(0.5), dec!(1100000))
            .unwrap();

        assert_eq!(bid.trades.len(), 1);
        assert_eq!(bid.order.status, OrderStatus::Filled);
        let trade = &bid.trades[0];
        assert_eq!(trade.total_value, dec!(500000));
        assert_eq!(trade.taker_side, OrderType::BUY);

        // buyer paid 500000 + 500 fee, excess reservation released
        let alice_thb = exchange.ledger().wallet(alice, &thb).unwrap();
        assert_eq!(alice_thb.available, dec!(1499500));
        assert_eq!(alice_thb.locked, Decimal::ZERO);
        let bob_thb = exchange.ledger().wallet(bob, &thb).unwrap();
        assert_eq!(bob_thb.available, dec!(499500));
        let fees = exchange.ledger().wallet(UserId::new(1), &thb).unwrap();
        assert_eq!(fees.available, dec!(1000));

        let open = exchange.open_orders(&OrderFilter::default());
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, ask.order.id);

        let stats = exchange.market_stats(&btc, &thb);
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.last_price.map(|p| p.as_decimal()), Some(dec!(1000000)));

        let public = exchange.public_trades(&btc, &thb, None);
        assert_eq!(public.len(), 1);
        let mine = exchange.user_trades(bob, &TradeFilter::default());
        assert_eq!(mine[0].side, OrderType::SELL);

        let cancelled = exchange.cancel_order(ask.order.id, bob).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        let bob_btc = exchange.ledger().wallet(bob, &btc).unwrap();
        assert_eq!(bob_btc.available, dec!(0.5));
        assert_eq!(bob_btc.locked, Decimal::ZERO);
    }

    #[test]
    fn test_order_fills_and_trade_lookup() {
        let (clock, exchange) = exchange();
        let btc = currency("BTC");
        let usdt = currency("USDT");
        let (alice, bob, carol) = (UserId::new(10), UserId::new(11), UserId::new(12));
        for user in [alice, bob, carol] {
            exchange.register_user(user);
        }
        exchange.ledger().credit(alice, &usdt, dec!(1000)).unwrap();
        exchange.ledger().credit(bob, &btc, dec!(1)).unwrap();

        let ask = exchange
            .submit_order(bob, OrderType::SELL, &btc, &usdt, dec!(1), dec!(100))
            .unwrap();
        for _ in 0..2 {
            clock.advance(1);
            exchange
                .submit_order(alice, OrderType::BUY, &btc, &usdt, dec!(0.25), dec!(100))
                .unwrap();
        }

        let (order, fills) = exchange.order_fills(ask.order.id, Some(bob)).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(fills.len(), 2);
        assert!(fills[0].sequence < fills[1].sequence);
        assert!(exchange.order_fills(ask.order.id, Some(alice)).is_err());

        let trade_id = fills[0].id;
        assert_eq!(exchange.trade_by_id(trade_id, alice).unwrap().id, trade_id);
        assert!(exchange.trade_by_id(trade_id, carol).is_none());
    }

    #[test]
    fn test_out_of_range_order_rejected_without_side_effects() {
        let (_, exchange) = exchange();
        let btc = currency("BTC");
        let usdt = currency("USDT");
        let user = UserId::new(10);
        exchange.register_user(user);
        exchange.ledger().credit(user, &usdt, dec!(1000)).unwrap();

        let huge = dec!(1000000000000000);
        let err = exchange
            .submit_order(user, OrderType::BUY, &btc, &usdt, huge, huge)
            .unwrap_err();
        assert_eq!(err.kind(), types::errors::ErrorKind::Validation);

        assert!(exchange.orders().is_empty());
        let wallet = exchange.ledger().wallet(user, &usdt).unwrap();
        assert_eq!(wallet.available, dec!(1000));
        assert_eq!(wallet.locked, Decimal::ZERO);
    }

    #[test]
    fn test_user_orders_use_configured_limit() {
        let clock = Arc::new(ManualClock::new(0));
        let mut config = ExchangeConfig::default();
        config.limits.user_orders = 2;
        let exchange = Exchange::new(config, clock.clone()).unwrap();
        let user = UserId::new(5);
        exchange.register_user(user);
        exchange.ledger().credit(user, &currency("USDT"), dec!(100)).unwrap();

        for _ in 0..3 {
            clock.advance(1);
            exchange
                .submit_order(user, OrderType::BUY, &currency("BTC"), &currency("USDT"), dec!(0.001), dec!(10))
                .unwrap();
        }
        assert_eq!(exchange.user_orders(user, &OrderFilter::default()).len(), 2);
        let all = OrderFilter {
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(exchange.user_orders(user, &all).len(), 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ExchangeConfig {
            fee_rate: dec!(-0.1),
            ..ExchangeConfig::default()
        };
        assert!(Exchange::with_system_clock(config).is_err());
    }
}
