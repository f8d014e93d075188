//! Trading fee schedule
//!
//! A single flat rate applies to both sides of every trade. The buyer pays
//! it on top of the quote value; the seller's fee is assessed on the base
//! amount and withheld from the quote proceeds at the trade price.
//!
//! Every product is exact: a value that would overflow or need rounding is
//! rejected with `ValueOutOfRange` instead.

use crate::errors::ValidationError;
use crate::numeric::{ceil_to_scale, exact_mul, Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Flat fee schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub rate: Decimal,
}

impl FeeSchedule {
    /// 0.1% per side
    pub const DEFAULT_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }

    /// Buyer fee, quote units
    pub fn buyer_fee(&self, total_value: Decimal) -> Result<Decimal, ValidationError> {
        self.apply_rate(total_value)
    }

    /// Seller fee, base units
    pub fn seller_fee(&self, amount: Quantity) -> Result<Decimal, ValidationError> {
        self.apply_rate(amount.as_decimal())
    }

    /// Quote a BUY must reserve so fills at its limit price, fee included,
    /// are always covered
    pub fn buy_reservation(&self, amount: Quantity, price: Price) -> Result<Decimal, ValidationError> {
        self.buy_cost(amount, price).map(ceil_to_scale)
    }

    /// Exact quote cost of buying `amount` at `price`, fee included
    pub fn buy_cost(&self, amount: Quantity, price: Price) -> Result<Decimal, ValidationError> {
        let value = amount.notional(price)?;
        value
            .checked_add(self.buyer_fee(value)?)
            .ok_or_else(|| out_of_range(value))
    }

    fn apply_rate(&self, value: Decimal) -> Result<Decimal, ValidationError> {
        exact_mul(value, self.rate).ok_or_else(|| out_of_range(value))
    }
}

fn out_of_range(value: Decimal) -> ValidationError {
    ValidationError::ValueOutOfRange(value.to_string())
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RATE)
    }
}
