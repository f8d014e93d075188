//! Read-side query building
//!
//! Callers fill a typed filter struct; the store compiles it to a list of
//! tagged clauses and evaluates them against in-memory records. Every
//! recognized filter field is enumerated here, nothing is parsed from
//! free-form strings.

use crate::ids::UserId;
use crate::market::Currency;
use crate::order::{OrderStatus, OrderType, TradeOrder};
use crate::trade::MatchEvent;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default page size for per-user order and trade listings
pub const DEFAULT_USER_LIMIT: usize = 50;

/// Default page size for public trade listings
pub const DEFAULT_PUBLIC_LIMIT: usize = 20;

// ───── Orders ─────

/// Order listing filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFilter {
    pub order_type: Option<OrderType>,
    pub base_currency: Option<Currency>,
    pub quote_currency: Option<Currency>,
    pub status: Option<OrderStatus>,
    pub limit: Option<usize>,
}

impl OrderFilter {
    pub fn clauses(&self) -> Vec<OrderClause> {
        let mut clauses = Vec::new();
        if let Some(order_type) = self.order_type {
            clauses.push(OrderClause::Type(order_type));
        }
        if let Some(base) = &self.base_currency {
            clauses.push(OrderClause::Base(base.clone()));
        }
        if let Some(quote) = &self.quote_currency {
            clauses.push(OrderClause::Quote(quote.clone()));
        }
        if let Some(status) = self.status {
            clauses.push(OrderClause::Status(status));
        }
        clauses
    }
}

/// Single order predicate
#[derive(Debug, Clone, PartialEq)]
pub enum OrderClause {
    Owner(UserId),
    Type(OrderType),
    Base(Currency),
    Quote(Currency),
    Status(OrderStatus),
    /// OPEN or PARTIALLY_FILLED with something left to fill
    Resting,
}

impl OrderClause {
    pub fn matches(&self, order: &TradeOrder) -> bool {
        match self {
            OrderClause::Owner(user) => order.user_id == *user,
            OrderClause::Type(order_type) => order.order_type == *order_type,
            OrderClause::Base(base) => order.pair.base == *base,
            OrderClause::Quote(quote) => order.pair.quote == *quote,
            OrderClause::Status(status) => order.status == *status,
            OrderClause::Resting => order.is_resting(),
        }
    }
}

/// Result ordering for order listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSort {
    /// Most recent first
    NewestFirst,
    /// BUY before SELL, best price first, then oldest first
    BookPriority,
}

impl OrderSort {
    pub fn compare(&self, a: &TradeOrder, b: &TradeOrder) -> Ordering {
        match self {
            OrderSort::NewestFirst => b
                .created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id)),
            OrderSort::BookPriority => {
                let side_rank = |o: &TradeOrder| match o.order_type {
                    OrderType::BUY => 0u8,
                    OrderType::SELL => 1u8,
                };
                side_rank(a)
                    .cmp(&side_rank(b))
                    .then_with(|| match a.order_type {
                        OrderType::BUY => b.price_per_unit.cmp(&a.price_per_unit),
                        OrderType::SELL => a.price_per_unit.cmp(&b.price_per_unit),
                    })
                    .then_with(|| a.created_at.cmp(&b.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            }
        }
    }
}

/// Conjunction of clauses plus ordering and page size
#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuery {
    pub clauses: Vec<OrderClause>,
    pub sort: OrderSort,
    pub limit: Option<usize>,
}

impl OrderQuery {
    pub fn new(sort: OrderSort) -> Self {
        Self {
            clauses: Vec::new(),
            sort,
            limit: None,
        }
    }

    pub fn with(mut self, clause: OrderClause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Add the filter's clauses; its limit overrides any earlier one
    pub fn with_filter(mut self, filter: &OrderFilter) -> Self {
        self.clauses.extend(filter.clauses());
        if filter.limit.is_some() {
            self.limit = filter.limit;
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, order: &TradeOrder) -> bool {
        self.clauses.iter().all(|clause| clause.matches(order))
    }

    /// Filter, sort and truncate
    pub fn run(&self, orders: impl IntoIterator<Item = TradeOrder>) -> Vec<TradeOrder> {
        let mut selected: Vec<TradeOrder> = orders
            .into_iter()
            .filter(|order| self.matches(order))
            .collect();
        selected.sort_by(|a, b| self.sort.compare(a, b));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

// ───── Trades ─────

/// Trade listing filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeFilter {
    pub base_currency: Option<Currency>,
    pub quote_currency: Option<Currency>,
    pub limit: Option<usize>,
}

impl TradeFilter {
    pub fn clauses(&self) -> Vec<TradeClause> {
        let mut clauses = Vec::new();
        if let Some(base) = &self.base_currency {
            clauses.push(TradeClause::Base(base.clone()));
        }
        if let Some(quote) = &self.quote_currency {
            clauses.push(TradeClause::Quote(quote.clone()));
        }
        clauses
    }
}

/// Single trade predicate
#[derive(Debug, Clone, PartialEq)]
pub enum TradeClause {
    Participant(UserId),
    Base(Currency),
    Quote(Currency),
    /// Executed at or after the given unix-nanos timestamp
    Since(i64),
}

impl TradeClause {
    pub fn matches(&self, event: &MatchEvent) -> bool {
        match self {
            TradeClause::Participant(user) => event.involves(*user),
            TradeClause::Base(base) => event.pair.base == *base,
            TradeClause::Quote(quote) => event.pair.quote == *quote,
            TradeClause::Since(ts) => event.created_at >= *ts,
        }
    }
}

/// Conjunction of trade clauses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeQuery {
    pub clauses: Vec<TradeClause>,
    pub limit: Option<usize>,
}

impl TradeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, clause: TradeClause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn with_filter(mut self, filter: &TradeFilter) -> Self {
        self.clauses.extend(filter.clauses());
        if filter.limit.is_some() {
            self.limit = filter.limit;
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, event: &MatchEvent) -> bool {
        self.clauses.iter().all(|clause| clause.matches(event))
    }
}
