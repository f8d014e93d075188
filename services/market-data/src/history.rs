//! Trade history
//!
//! Append-only log of executed matches. The matching engine is the only
//! writer; records are never updated or removed. Every append is assigned the
//! next sequence number, starting at 1.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::ids::{OrderId, TradeId, UserId};
use types::market::{Currency, CurrencyPair};
use types::numeric::{Price, Quantity};
use types::order::OrderType;
use types::query::{TradeClause, TradeFilter, TradeQuery, DEFAULT_PUBLIC_LIMIT, DEFAULT_USER_LIMIT};
use types::trade::MatchEvent;

use crate::stats::{MarketStats, StatsWindow};

/// A trade as shown to everyone: no participant ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicTrade {
    pub trade_id: TradeId,
    pub sequence: u64,
    pub pair: CurrencyPair,
    pub price: Price,
    pub amount: Quantity,
    pub total_value: Decimal,
    pub taker_side: OrderType,
    pub timestamp: i64,
}

impl From<&MatchEvent> for PublicTrade {
    fn from(event: &MatchEvent) -> Self {
        Self {
            trade_id: event.id,
            sequence: event.sequence,
            pair: event.pair.clone(),
            price: event.price_per_unit,
            amount: event.amount,
            total_value: event.total_value,
            taker_side: event.taker_side,
            timestamp: event.created_at,
        }
    }
}

/// A trade seen by one of its participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTrade {
    #[serde(flatten)]
    pub event: MatchEvent,
    /// Side the viewing user traded on
    pub side: OrderType,
    /// Fee paid by the viewing user
    pub fee: Decimal,
    pub fee_currency: Currency,
}

impl UserTrade {
    fn for_user(event: &MatchEvent, user: UserId) -> Option<Self> {
        let side = event.side_of(user)?;
        let (fee, fee_currency) = match side {
            OrderType::BUY => (event.buyer_fee, event.pair.quote.clone()),
            OrderType::SELL => (event.seller_fee, event.pair.base.clone()),
        };
        Some(Self {
            event: event.clone(),
            side,
            fee,
            fee_currency,
        })
    }
}

/// Append-only match log
#[derive(Debug, Default)]
pub struct TradeHistory {
    log: RwLock<Vec<MatchEvent>>,
}

impl TradeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a match, assigning its sequence number
    pub fn record_match(&self, mut event: MatchEvent) -> MatchEvent {
        let mut log = self.log.write();
        event.sequence = log.len() as u64 + 1;
        log.push(event.clone());
        debug!(
            trade_id = %event.id,
            sequence = event.sequence,
            pair = %event.pair,
            amount = %event.amount,
            price = %event.price_per_unit,
            "match recorded"
        );
        event
    }

    pub fn len(&self) -> usize {
        self.log.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.read().is_empty()
    }

    /// Matches satisfying `query`, newest first
    pub fn query(&self, query: &TradeQuery) -> Vec<MatchEvent> {
        let limit = query.limit.unwrap_or(usize::MAX);
        self.log
            .read()
            .iter()
            .rev()
            .filter(|event| query.matches(event))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Trades where `user` was buyer or seller, newest first
    pub fn get_user_trades(&self, user: UserId, filter: &TradeFilter) -> Vec<UserTrade> {
        let query = TradeQuery::new()
            .limit(DEFAULT_USER_LIMIT)
            .with(TradeClause::Participant(user))
            .with_filter(filter);
        self.query(&query)
            .iter()
            .filter_map(|event| UserTrade::for_user(event, user))
            .collect()
    }

    /// Latest trades of a pair, newest first
    pub fn get_public_trades(&self, pair: &CurrencyPair, limit: Option<usize>) -> Vec<PublicTrade> {
        let query = TradeQuery::new()
            .with(TradeClause::Base(pair.base.clone()))
            .with(TradeClause::Quote(pair.quote.clone()))
            .limit(limit.unwrap_or(DEFAULT_PUBLIC_LIMIT));
        self.query(&query).iter().map(PublicTrade::from).collect()
    }

    /// Statistics over the window ending at `now`
    pub fn get_market_stats(&self, pair: &CurrencyPair, window: StatsWindow, now: i64) -> MarketStats {
        let log = self.log.read();
        MarketStats::aggregate(pair, log.iter(), window.start(now), now)
    }

    /// All matches involving `order_id`, oldest first
    pub fn trades_for_order(&self, order_id: OrderId) -> Vec<MatchEvent> {
        self.log
            .read()
            .iter()
            .filter(|e| e.buy_order_id == order_id || e.sell_order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn get_by_id(&self, trade_id: TradeId) -> Option<MatchEvent> {
        self.log.read().iter().find(|e| e.id == trade_id).cloned()
    }

    /// Full log, oldest first
    pub fn replay_history(&self) -> Vec<MatchEvent> {
        self.log.read().clone()
    }
}
