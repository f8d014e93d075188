//! Trade execution logic
//!
//! Turns one fill between a taker and a maker into a [`TradePlan`]: the
//! match record, the fees, and the ledger postings that settle it. Nothing
//! is written here; the engine stages the plan and commits it.

use ledger::{Entry, PostingBatch};
use rust_decimal::Decimal;
use types::errors::OrderError;
use types::fee::FeeSchedule;
use types::ids::UserId;
use types::numeric::{exact_mul, Quantity};
use types::order::{OrderType, TradeOrder};
use types::trade::MatchEvent;

/// Settlement of one fill
#[derive(Debug, Clone)]
pub struct TradePlan {
    /// Unsequenced match record
    pub event: MatchEvent,
    /// Quote taken from the buyer's reservation: total value + buyer fee
    pub buyer_cost: Decimal,
    /// Reservation handed back to the buyer beyond what the rest of the order needs
    pub buyer_release: Decimal,
    /// Quote credited to the seller: total value − seller fee × price
    pub seller_proceeds: Decimal,
    /// Buyer and seller fees, both in quote
    pub fee_total: Decimal,
    pub postings: PostingBatch,
}

impl TradePlan {
    /// Plan a fill of `amount` at the maker's price
    pub fn build(
        fees: &FeeSchedule,
        fee_account: Option<UserId>,
        taker: &TradeOrder,
        maker: &TradeOrder,
        amount: Quantity,
        timestamp: i64,
    ) -> Result<Self, String> {
        if taker.order_type == maker.order_type {
            return Err("taker and maker are on the same side".to_string());
        }
        if taker.pair != maker.pair {
            return Err(format!("pair mismatch: {} vs {}", taker.pair, maker.pair));
        }
        if taker.user_id == maker.user_id {
            return Err(format!("self-trade by user {}", taker.user_id));
        }
        let (buy, sell) = match taker.order_type {
            OrderType::BUY => (taker, maker),
            OrderType::SELL => (maker, taker),
        };
        let price = maker.price_per_unit;

        let total_value = amount.notional(price).map_err(|e| e.to_string())?;
        let event = MatchEvent::new(
            buy.id,
            sell.id,
            buy.user_id,
            sell.user_id,
            maker.pair.clone(),
            amount,
            price,
            fees.buyer_fee(total_value).map_err(|e| e.to_string())?,
            fees.seller_fee(amount).map_err(|e| e.to_string())?,
            taker.order_type,
            timestamp,
        )
        .map_err(|e| e.to_string())?;

        let seller_fee_quote = exact_mul(event.seller_fee, price.as_decimal())
            .ok_or_else(|| format!("seller fee {} at {price} is out of range", event.seller_fee))?;
        let buyer_cost = checked(event.total_value.checked_add(event.buyer_fee), "buyer cost")?;
        let seller_proceeds = checked(event.total_value.checked_sub(seller_fee_quote), "seller proceeds")?;
        let fee_total = checked(event.buyer_fee.checked_add(seller_fee_quote), "fee total")?;

        // the buyer keeps enough locked to fill the rest at its own limit price
        let remaining_after = buy
            .remaining_amount
            .checked_sub(amount)
            .ok_or_else(|| format!("fill {amount} exceeds remaining {}", buy.remaining_amount))?;
        let still_needed = if remaining_after.is_zero() {
            Decimal::ZERO
        } else {
            fees.buy_cost(remaining_after, buy.price_per_unit)
                .map_err(|e| e.to_string())?
        };
        let buyer_release = checked(
            buy.locked_amount
                .checked_sub(buyer_cost)
                .and_then(|left| left.checked_sub(still_needed)),
            "buyer release",
        )?
        .max(Decimal::ZERO);

        let base = &maker.pair.base;
        let quote = &maker.pair.quote;
        let mut postings = PostingBatch::new();
        postings.push(event.buyer_id, base, Entry::Credit, amount.as_decimal());
        postings.push(event.buyer_id, quote, Entry::DebitLocked, buyer_cost);
        postings.push(event.buyer_id, quote, Entry::Unlock, buyer_release);
        postings.push(event.seller_id, base, Entry::DebitLocked, amount.as_decimal());
        postings.push(event.seller_id, quote, Entry::Credit, seller_proceeds);
        if let Some(account) = fee_account {
            postings.push(account, quote, Entry::Credit, fee_total);
        }

        Ok(Self {
            event,
            buyer_cost,
            buyer_release,
            seller_proceeds,
            fee_total,
            postings,
        })
    }

    /// Apply this fill to a copy of one of the two orders
    pub fn stage(&self, order: &TradeOrder) -> Result<TradeOrder, OrderError> {
        let mut staged = order.clone();
        let (consumed, released) = match order.order_type {
            OrderType::BUY => (self.buyer_cost, self.buyer_release),
            OrderType::SELL => (self.event.amount.as_decimal(), Decimal::ZERO),
        };
        staged.apply_fill(self.event.amount, consumed, released, self.event.created_at)?;
        Ok(staged)
    }
}

fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal, String> {
    value.ok_or_else(|| format!("{what} is out of range"))
}
