//! Crossing detection logic
//!
//! Determines when a bid and ask can match based on price compatibility

use types::numeric::Price;
use types::order::OrderType;

/// A bid crosses an ask when bid ≥ ask
pub fn can_match(bid_price: Price, ask_price: Price) -> bool {
    bid_price >= ask_price
}

/// Whether an incoming order crosses a resting order at `resting_price`
pub fn incoming_can_match(incoming: OrderType, incoming_price: Price, resting_price: Price) -> bool {
    match incoming {
        OrderType::BUY => can_match(incoming_price, resting_price),
        OrderType::SELL => can_match(resting_price, incoming_price),
    }
}
