//! Matching engine core
//!
//! One incoming order is matched as a single unit under its pair's book
//! lock: candidate selection and every fill it triggers run without any
//! other writer on that pair. Each fill is settled atomically:
//! 1. the plan is staged on copies of both orders
//! 2. the ledger batch commits
//! 3. both orders commit
//! 4. the match is appended to the trade history
//!
//! A failed fill changes nothing and stops matching for the incoming order.

use parking_lot::MutexGuard;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::clock::Clock;
use types::errors::{ExchangeError, OrderError, SettlementError};
use types::ids::{OrderId, UserId};
use types::market::CurrencyPair;
use types::numeric::Quantity;
use types::order::{OrderType, TradeOrder};
use types::trade::MatchEvent;

use ledger::Ledger;
use market_data::TradeHistory;

use crate::book::PairBook;
use crate::matching::TradePlan;
use crate::store::{OrderBookStore, OrderHandle};

/// Where an incoming order ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderState {
    /// Remaining amount rests in the book
    Resting,
    /// Nothing left to fill
    Filled,
}

/// Result of submitting an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order: TradeOrder,
    pub trades: Vec<MatchEvent>,
    pub state: OrderState,
}

/// Main matching engine
pub struct MatchingEngine {
    ledger: Arc<Ledger>,
    store: Arc<OrderBookStore>,
    history: Arc<TradeHistory>,
    fee_account: Option<UserId>,
    clock: Arc<dyn Clock>,
}

impl MatchingEngine {
    pub fn new(
        ledger: Arc<Ledger>,
        store: Arc<OrderBookStore>,
        history: Arc<TradeHistory>,
        fee_account: Option<UserId>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            store,
            history,
            fee_account,
            clock,
        }
    }

    /// Create an order and match it against the book
    pub fn submit_order(
        &self,
        user_id: UserId,
        order_type: OrderType,
        pair: CurrencyPair,
        amount: Decimal,
        price: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        let request = self.store.validate(user_id, order_type, pair, amount, price)?;
        let book = self.store.book(&request.pair);
        let mut book = book.lock();

        let order = self.store.open_order(&request)?;
        let handle = self
            .store
            .handle(order.id)
            .ok_or_else(|| order_not_found(order.id))?;
        self.run_matching(&mut book, order.id, &handle)
    }

    /// Match an existing resting order as the taker
    ///
    /// The order keeps its queue position on its own side of the book while
    /// it matches.
    pub fn process_order_matching(&self, order_id: OrderId) -> Result<OrderResult, ExchangeError> {
        let handle = self
            .store
            .handle(order_id)
            .ok_or_else(|| order_not_found(order_id))?;
        let pair = handle.lock().pair.clone();
        let book = self.store.book(&pair);
        let mut book = book.lock();
        {
            let order = handle.lock();
            if !order.is_resting() {
                return Err(OrderError::Terminal {
                    order_id: order.id.to_string(),
                    status: order.status.to_string(),
                }
                .into());
            }
        }
        self.run_matching(&mut book, order_id, &handle)
    }

    fn run_matching(
        &self,
        book: &mut PairBook,
        taker_id: OrderId,
        taker_handle: &OrderHandle,
    ) -> Result<OrderResult, ExchangeError> {
        let candidates = {
            let taker = taker_handle.lock();
            book.candidates(&taker)
        };

        let mut trades: Vec<MatchEvent> = Vec::new();
        for maker_id in candidates {
            let Some(maker_handle) = self.store.handle(maker_id) else {
                let reason = "maker order missing".to_string();
                return Err(self.abort(book, taker_handle, maker_id, trades.len(), reason));
            };
            let (mut taker, mut maker) =
                lock_both(taker_handle, taker_id, &maker_handle, maker_id);
            if taker.remaining_amount.is_zero() {
                break;
            }
            if !maker.is_resting() {
                book.sync(&maker);
                continue;
            }

            let fill = taker.remaining_amount.min(maker.remaining_amount);
            match self.execute_trade(&mut taker, &mut maker, fill) {
                Ok(event) => {
                    book.sync(&maker);
                    trades.push(event);
                }
                Err(reason) => {
                    drop(taker);
                    drop(maker);
                    return Err(self.abort(book, taker_handle, maker_id, trades.len(), reason));
                }
            }
        }

        let taker = taker_handle.lock().clone();
        book.place(&taker);
        let state = if taker.is_resting() {
            OrderState::Resting
        } else {
            OrderState::Filled
        };
        info!(
            order_id = %taker.id,
            status = %taker.status,
            trades = trades.len(),
            remaining = %taker.remaining_amount,
            "order matched"
        );
        Ok(OrderResult {
            order: taker,
            trades,
            state,
        })
    }

    /// Settle one fill; on error neither order, the ledger nor the history changed
    fn execute_trade(
        &self,
        taker: &mut TradeOrder,
        maker: &mut TradeOrder,
        amount: Quantity,
    ) -> Result<MatchEvent, String> {
        let plan = TradePlan::build(
            self.store.fees(),
            self.fee_account,
            taker,
            maker,
            amount,
            self.clock.now_nanos(),
        )?;
        let staged_taker = plan.stage(taker).map_err(|e| e.to_string())?;
        let staged_maker = plan.stage(maker).map_err(|e| e.to_string())?;

        self.ledger
            .apply(plan.postings.as_slice())
            .map_err(|e| e.to_string())?;
        *taker = staged_taker;
        *maker = staged_maker;

        let event = self.history.record_match(plan.event);
        debug!(
            trade_id = %event.id,
            sequence = event.sequence,
            buy_order_id = %event.buy_order_id,
            sell_order_id = %event.sell_order_id,
            amount = %event.amount,
            price = %event.price_per_unit,
            buyer_fee = %event.buyer_fee,
            seller_fee = %event.seller_fee,
            "trade executed"
        );
        Ok(event)
    }

    /// Leave the taker resting in its last committed state and report the failure
    fn abort(
        &self,
        book: &mut PairBook,
        taker_handle: &OrderHandle,
        maker_id: OrderId,
        trades_executed: usize,
        reason: String,
    ) -> ExchangeError {
        let taker = taker_handle.lock().clone();
        book.place(&taker);
        warn!(
            taker_order_id = %taker.id,
            maker_order_id = %maker_id,
            trades_executed,
            reason = %reason,
            "settlement failed, matching halted"
        );
        SettlementError::SettlementFailure {
            taker_order_id: taker.id.to_string(),
            maker_order_id: maker_id.to_string(),
            trades_executed,
            reason,
        }
        .into()
    }
}

/// Lock two orders in ascending id order; returns (taker, maker)
fn lock_both<'a>(
    taker: &'a OrderHandle,
    taker_id: OrderId,
    maker: &'a OrderHandle,
    maker_id: OrderId,
) -> (MutexGuard<'a, TradeOrder>, MutexGuard<'a, TradeOrder>) {
    if taker_id < maker_id {
        let taker = taker.lock();
        let maker = maker.lock();
        (taker, maker)
    } else {
        let maker = maker.lock();
        let taker = taker.lock();
        (taker, maker)
    }
}

fn order_not_found(order_id: OrderId) -> ExchangeError {
    OrderError::NotFound {
        order_id: order_id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use types::clock::ManualClock;
    use types::errors::ErrorKind;
    use types::fee::FeeSchedule;
    use types::market::{Currency, CurrencyKind, MarketRegistry};
    use types::order::OrderStatus;
    use types::query::OrderFilter;

    struct Fixture {
        ledger: Arc<Ledger>,
        store: Arc<OrderBookStore>,
        history: Arc<TradeHistory>,
        engine: MatchingEngine,
    }

    fn currency(code: &str) -> Currency {
        Currency::new(code).unwrap()
    }

    fn pair() -> CurrencyPair {
        "BTC/USDT".parse().unwrap()
    }

    fn setup(fee_rate: Decimal, fee_account: Option<UserId>) -> Fixture {
        let mut registry = MarketRegistry::new();
        registry.add_currency(currency("USDT"), CurrencyKind::Crypto);
        registry.add_currency(currency("BTC"), CurrencyKind::Crypto);
        registry.add_pair(pair()).unwrap();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_000));
        let ledger = Arc::new(Ledger::new(Arc::new(registry), clock.clone()));
        let store = Arc::new(OrderBookStore::new(
            ledger.clone(),
            FeeSchedule::new(fee_rate),
            clock.clone(),
        ));
        let history = Arc::new(TradeHistory::new());
        let engine = MatchingEngine::new(
            ledger.clone(),
            store.clone(),
            history.clone(),
            fee_account,
            clock,
        );
        Fixture {
            ledger,
            store,
            history,
            engine,
        }
    }

    impl Fixture {
        fn fund(&self, user: u64, code: &str, amount: Decimal) -> UserId {
            let user = UserId::new(user);
            self.ledger.create_wallet(user, &currency(code)).unwrap();
            self.ledger.credit(user, &currency(code), amount).unwrap();
            user
        }

        fn balance(&self, user: UserId, code: &str) -> (Decimal, Decimal) {
            let wallet = self.ledger.wallet(user, &currency(code)).unwrap();
            (wallet.available, wallet.locked)
        }

        fn submit(&self, user: UserId, side: OrderType, amount: Decimal, price: Decimal) -> OrderResult {
            self.engine.submit_order(user, side, pair(), amount, price).unwrap()
        }
    }

    #[test]
    fn test_engine_resting_order() {
        let fx = setup(dec!(0.001), None);
        let alice = fx.fund(1, "USDT", dec!(1000));

        let result = fx.submit(alice, OrderType::BUY, dec!(0.01), dec!(60000));
        assert_eq!(result.state, OrderState::Resting);
        assert!(result.trades.is_empty());
        assert_eq!(result.order.status, OrderStatus::Open);
        assert_eq!(fx.store.depth(&pair(), 5).bids.len(), 1);
    }

    #[test]
    fn test_engine_partial_fill_at_maker_price() {
        let fx = setup(dec!(0.001), None);
        let alice = fx.fund(1, "USDT", dec!(1000));
        let bob = fx.fund(2, "BTC", dec!(0.02));

        let buy = fx.submit(alice, OrderType::BUY, dec!(0.01), dec!(60000));
        let sell = fx.submit(bob, OrderType::SELL, dec!(0.02), dec!(59000));

        assert_eq!(sell.trades.len(), 1);
        let trade = &sell.trades[0];
        assert_eq!(trade.price_per_unit.as_decimal(), dec!(60000));
        assert_eq!(trade.amount.as_decimal(), dec!(0.01));
        assert_eq!(trade.sequence, 1);
        assert_eq!(sell.state, OrderState::Resting);
        assert_eq!(sell.order.status, OrderStatus::PartiallyFilled);
        assert_eq!(sell.order.remaining_amount.as_decimal(), dec!(0.01));

        let filled = fx.store.order_by_id(buy.order.id, None).unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);

        assert_eq!(fx.balance(alice, "BTC"), (dec!(0.01), Decimal::ZERO));
        assert_eq!(fx.balance(alice, "USDT"), (dec!(399.4), Decimal::ZERO));
        assert_eq!(fx.balance(bob, "BTC"), (Decimal::ZERO, dec!(0.01)));
        assert_eq!(fx.balance(bob, "USDT"), (dec!(599.4), Decimal::ZERO));

        let depth = fx.store.depth(&pair(), 5);
        assert!(depth.bids.is_empty());
        assert_eq!(depth.asks[0].1.as_decimal(), dec!(0.01));
    }

    #[test]
    fn test_engine_walks_book_in_priority() {
        let fx = setup(Decimal::ZERO, None);
        let seller_a = fx.fund(2, "BTC", dec!(1));
        let seller_b = fx.fund(3, "BTC", dec!(1));
        let seller_c = fx.fund(4, "BTC", dec!(1));
        let buyer = fx.fund(1, "USDT", dec!(1000));

        let a = fx.submit(seller_a, OrderType::SELL, dec!(1), dec!(101));
        let b = fx.submit(seller_b, OrderType::SELL, dec!(1), dec!(100));
        let c = fx.submit(seller_c, OrderType::SELL, dec!(1), dec!(101));

        let result = fx.submit(buyer, OrderType::BUY, dec!(2.5), dec!(101));
        let makers: Vec<OrderId> = result.trades.iter().map(|t| t.sell_order_id).collect();
        assert_eq!(makers, vec![b.order.id, a.order.id, c.order.id]);
        assert_eq!(result.state, OrderState::Filled);
        assert_eq!(result.trades[2].amount.as_decimal(), dec!(0.5));

        // 100 + 101 + 50.5 spent of 252.5 reserved
        assert_eq!(fx.balance(buyer, "USDT"), (dec!(748.5), Decimal::ZERO));
        let rest = fx.store.order_by_id(c.order.id, None).unwrap();
        assert_eq!(rest.status, OrderStatus::PartiallyFilled);
        assert_eq!(rest.remaining_amount.as_decimal(), dec!(0.5));
    }

    #[test]
    fn test_engine_skips_own_orders() {
        let fx = setup(Decimal::ZERO, None);
        let user = fx.fund(1, "USDT", dec!(1000));
        fx.ledger.create_wallet(user, &currency("BTC")).unwrap();
        fx.ledger.credit(user, &currency("BTC"), dec!(1)).unwrap();

        fx.submit(user, OrderType::SELL, dec!(1), dec!(100));
        let buy = fx.submit(user, OrderType::BUY, dec!(1), dec!(100));
        assert!(buy.trades.is_empty());
        assert_eq!(fx.store.open_orders(&OrderFilter::default()).len(), 2);
        assert!(fx.history.is_empty());
    }

    #[test]
    fn test_settlement_failure_rolls_back_fill() {
        // fee account without wallets makes every ledger batch fail
        let fx = setup(dec!(0.001), Some(UserId::new(999)));
        let alice = fx.fund(1, "USDT", dec!(1000));
        let bob = fx.fund(2, "BTC", dec!(0.02));

        let buy = fx.submit(alice, OrderType::BUY, dec!(0.01), dec!(60000));
        let err = fx
            .engine
            .submit_order(bob, OrderType::SELL, pair(), dec!(0.02), dec!(59000))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SettlementFailure);
        match &err {
            ExchangeError::Settlement(SettlementError::SettlementFailure {
                maker_order_id,
                trades_executed,
                ..
            }) => {
                assert_eq!(maker_order_id, &buy.order.id.to_string());
                assert_eq!(*trades_executed, 0);
            }
            other => panic!("unexpected error {other:?}"),
        }

        let maker = fx.store.order_by_id(buy.order.id, None).unwrap();
        assert_eq!(maker, buy.order);
        assert_eq!(fx.balance(alice, "USDT"), (dec!(399.4), dec!(600.6)));
        assert_eq!(fx.balance(alice, "BTC"), (Decimal::ZERO, Decimal::ZERO));
        assert_eq!(fx.balance(bob, "BTC"), (Decimal::ZERO, dec!(0.02)));
        assert!(fx.history.is_empty());

        // the taker rests untouched and stays cancellable
        let bob_orders = fx.store.user_orders(bob, &OrderFilter::default());
        assert_eq!(bob_orders[0].status, OrderStatus::Open);
        assert_eq!(fx.store.depth(&pair(), 5).asks.len(), 1);
        fx.store.cancel_order(bob_orders[0].id, bob).unwrap();
        assert_eq!(fx.balance(bob, "BTC"), (dec!(0.02), Decimal::ZERO));
    }

    #[test]
    fn test_process_order_matching_on_crossed_book() {
        let fx = setup(Decimal::ZERO, None);
        let alice = fx.fund(1, "USDT", dec!(1000));
        let bob = fx.fund(2, "BTC", dec!(1));

        let bid = fx
            .store
            .create_order(alice, OrderType::BUY, pair(), dec!(1), dec!(100))
            .unwrap();
        let ask = fx
            .store
            .create_order(bob, OrderType::SELL, pair(), dec!(1), dec!(90))
            .unwrap();

        let result = fx.engine.process_order_matching(ask.id).unwrap();
        assert_eq!(result.state, OrderState::Filled);
        assert_eq!(result.trades[0].price_per_unit.as_decimal(), dec!(100));
        assert_eq!(result.trades[0].taker_side, OrderType::SELL);
        assert_eq!(
            fx.store.order_by_id(bid.id, None).unwrap().status,
            OrderStatus::Filled
        );

        let err = fx.engine.process_order_matching(ask.id).unwrap_err();
        assert!(matches!(err, ExchangeError::Order(OrderError::Terminal { .. })));
    }

    #[test]
    fn test_rematching_keeps_time_priority() {
        let fx = setup(Decimal::ZERO, None);
        let alice = fx.fund(1, "USDT", dec!(1000));
        let bob = fx.fund(2, "USDT", dec!(1000));
        let carol = fx.fund(3, "BTC", dec!(1));

        let older = fx.submit(alice, OrderType::BUY, dec!(1), dec!(100)).order;
        let newer = fx.submit(bob, OrderType::BUY, dec!(1), dec!(100)).order;

        let rematched = fx.engine.process_order_matching(older.id).unwrap();
        assert_eq!(rematched.state, OrderState::Resting);
        assert!(rematched.trades.is_empty());
        let depth = fx.store.depth(&pair(), 5);
        assert_eq!(depth.bids.len(), 1);
        assert_eq!(depth.bids[0].1.as_decimal(), dec!(2));

        let sell = fx.submit(carol, OrderType::SELL, dec!(1), dec!(100));
        assert_eq!(sell.trades.len(), 1);
        assert_eq!(sell.trades[0].buy_order_id, older.id);
        assert_eq!(
            fx.store.order_by_id(newer.id, None).unwrap().status,
            OrderStatus::Open
        );
    }
}
