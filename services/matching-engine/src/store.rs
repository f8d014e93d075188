//! Order Book Store
//!
//! Owns every trade order and the per-pair resting index. Order creation
//! locks the order's reservation in the ledger before the order exists;
//! cancellation releases the outstanding reservation and flips the status
//! as one unit.
//!
//! Lock hierarchy: pair book → orders (ascending id) → wallets.

use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use types::clock::Clock;
use types::errors::{ExchangeError, OrderError};
use types::fee::FeeSchedule;
use types::ids::{OrderId, UserId};
use types::market::CurrencyPair;
use types::numeric::{Price, Quantity};
use types::order::{OrderType, TradeOrder};
use types::query::{OrderClause, OrderFilter, OrderQuery, OrderSort, DEFAULT_USER_LIMIT};

use ledger::Ledger;

use crate::book::{DepthSnapshot, PairBook};

pub(crate) type OrderHandle = Arc<Mutex<TradeOrder>>;
pub(crate) type BookHandle = Arc<Mutex<PairBook>>;

/// Validated order request
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub user_id: UserId,
    pub order_type: OrderType,
    pub pair: CurrencyPair,
    pub amount: Quantity,
    pub price: Price,
    /// Quote locked by a BUY (fee included) or base locked by a SELL
    pub reservation: Decimal,
}

pub struct OrderBookStore {
    ledger: Arc<Ledger>,
    fees: FeeSchedule,
    clock: Arc<dyn Clock>,
    orders: DashMap<OrderId, OrderHandle>,
    books: DashMap<CurrencyPair, BookHandle>,
}

impl OrderBookStore {
    pub fn new(ledger: Arc<Ledger>, fees: FeeSchedule, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            fees,
            clock,
            orders: DashMap::new(),
            books: DashMap::new(),
        }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    // ───────────────────────── Writes ─────────────────────────

    /// Check amount, price, pair and order value before anything is locked
    ///
    /// Orders whose value or reservation cannot be computed exactly are
    /// rejected here, never at settlement.
    pub fn validate(
        &self,
        user_id: UserId,
        order_type: OrderType,
        pair: CurrencyPair,
        amount: Decimal,
        price: Decimal,
    ) -> Result<OrderRequest, ExchangeError> {
        let amount = Quantity::positive(amount)?;
        let price = Price::try_new(price)?;
        self.ledger.registry().ensure_pair(&pair)?;
        let reservation = match order_type {
            OrderType::BUY => self.fees.buy_reservation(amount, price)?,
            OrderType::SELL => {
                amount.notional(price)?;
                amount.as_decimal()
            }
        };
        Ok(OrderRequest {
            user_id,
            order_type,
            pair,
            amount,
            price,
            reservation,
        })
    }

    /// Create an OPEN order and rest it in its book without matching
    pub fn create_order(
        &self,
        user_id: UserId,
        order_type: OrderType,
        pair: CurrencyPair,
        amount: Decimal,
        price: Decimal,
    ) -> Result<TradeOrder, ExchangeError> {
        let request = self.validate(user_id, order_type, pair, amount, price)?;
        let book = self.book(&request.pair);
        let mut book = book.lock();
        let order = self.open_order(&request)?;
        book.insert(&order);
        Ok(order)
    }

    /// Lock the reservation and register the order
    ///
    /// Callers hold the pair book lock and decide whether the order rests.
    pub(crate) fn open_order(&self, request: &OrderRequest) -> Result<TradeOrder, ExchangeError> {
        self.ledger.ensure_wallet(request.user_id, &request.pair.base)?;
        self.ledger.ensure_wallet(request.user_id, &request.pair.quote)?;

        let reservation = request.reservation;
        let order = TradeOrder::new(
            request.user_id,
            request.order_type,
            request.pair.clone(),
            request.amount,
            request.price,
            reservation,
            self.clock.now_nanos(),
        );
        self.ledger
            .lock(request.user_id, order.lock_currency(), reservation)?;

        self.orders
            .insert(order.id, Arc::new(Mutex::new(order.clone())));
        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            side = %order.order_type,
            pair = %order.pair,
            amount = %order.amount,
            price = %order.price_per_unit,
            locked = %reservation,
            "order accepted"
        );
        Ok(order)
    }

    /// Cancel a resting order owned by `user_id`
    ///
    /// The unlock and the CANCELLED transition commit together; if the unlock
    /// fails the order is left as it was.
    pub fn cancel_order(&self, order_id: OrderId, user_id: UserId) -> Result<TradeOrder, ExchangeError> {
        let handle = self.handle(order_id).ok_or_else(|| not_found(order_id))?;
        let (owner, pair) = {
            let order = handle.lock();
            (order.user_id, order.pair.clone())
        };
        if owner != user_id {
            return Err(not_found(order_id).into());
        }

        let book = self.book(&pair);
        let mut book = book.lock();
        let mut order = handle.lock();

        let mut staged = order.clone();
        let released = staged.cancel(self.clock.now_nanos())?;
        if released > Decimal::ZERO {
            self.ledger
                .unlock(staged.user_id, staged.lock_currency(), released)?;
        }
        *order = staged;
        book.remove(&order);

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            released = %released,
            "order cancelled"
        );
        Ok(order.clone())
    }

    // ───────────────────────── Reads ─────────────────────────

    /// Resting orders: BUY best price first, then SELL best price first
    pub fn open_orders(&self, filter: &OrderFilter) -> Vec<TradeOrder> {
        let query = OrderQuery::new(OrderSort::BookPriority)
            .with(OrderClause::Resting)
            .with_filter(filter);
        query.run(self.snapshot())
    }

    /// Orders of one user, newest first
    pub fn user_orders(&self, user_id: UserId, filter: &OrderFilter) -> Vec<TradeOrder> {
        let query = OrderQuery::new(OrderSort::NewestFirst)
            .limit(DEFAULT_USER_LIMIT)
            .with(OrderClause::Owner(user_id))
            .with_filter(filter);
        query.run(self.snapshot())
    }

    /// Single order; with `user_id` set, orders of other users are not found
    pub fn order_by_id(&self, order_id: OrderId, user_id: Option<UserId>) -> Result<TradeOrder, OrderError> {
        let handle = self.handle(order_id).ok_or_else(|| not_found(order_id))?;
        let order = handle.lock().clone();
        match user_id {
            Some(user) if user != order.user_id => Err(not_found(order_id)),
            _ => Ok(order),
        }
    }

    pub fn depth(&self, pair: &CurrencyPair, levels: usize) -> DepthSnapshot {
        match self.books.get(pair).map(|entry| entry.value().clone()) {
            Some(book) => book.lock().depth(levels),
            None => PairBook::new(pair.clone()).depth(levels),
        }
    }

    /// Copy of every order
    pub fn snapshot(&self) -> Vec<TradeOrder> {
        // collect handles first so no map shard is held while waiting on an order
        let handles: Vec<OrderHandle> = self
            .orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        handles.iter().map(|handle| handle.lock().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    // ───────────────────────── Internals ─────────────────────────

    pub(crate) fn handle(&self, order_id: OrderId) -> Option<OrderHandle> {
        self.orders.get(&order_id).map(|entry| entry.value().clone())
    }

    /// The pair's book, created on first use
    pub(crate) fn book(&self, pair: &CurrencyPair) -> BookHandle {
        if let Some(book) = self.books.get(pair) {
            return book.value().clone();
        }
        self.books
            .entry(pair.clone())
            .or_insert_with(|| Arc::new(Mutex::new(PairBook::new(pair.clone()))))
            .value()
            .clone()
    }
}

fn not_found(order_id: OrderId) -> OrderError {
    OrderError::NotFound {
        order_id: order_id.to_string(),
    }
}
