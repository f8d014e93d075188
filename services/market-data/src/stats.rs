//! Rolling market statistics
//!
//! Aggregates executed matches of one pair over a time window: trade count,
//! base volume, quote value, price range, average and volume-weighted price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::clock::NANOS_PER_SEC;
use types::market::CurrencyPair;
use types::numeric::{Price, MAX_SCALE};
use types::trade::MatchEvent;

/// Look-back window for statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsWindow {
    nanos: i64,
}

impl StatsWindow {
    pub fn from_secs(secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX / NANOS_PER_SEC);
        Self {
            nanos: secs.saturating_mul(NANOS_PER_SEC),
        }
    }

    pub fn hours(hours: u64) -> Self {
        Self::from_secs(hours.saturating_mul(3600))
    }

    pub fn duration_nanos(&self) -> i64 {
        self.nanos
    }

    /// First timestamp inside the window ending at `now`
    pub fn start(&self, now: i64) -> i64 {
        now.saturating_sub(self.nanos)
    }
}

impl Default for StatsWindow {
    fn default() -> Self {
        Self::hours(24)
    }
}

/// Aggregated statistics for one pair
///
/// Price fields are `None` when the window holds no trades. `last_price` is
/// the most recent trade of the pair, inside the window or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub pair: CurrencyPair,
    pub window_start: i64,
    pub window_end: i64,
    pub total_trades: u64,
    pub total_volume: Decimal,
    pub total_value: Decimal,
    pub avg_price: Option<Decimal>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub vwap: Option<Decimal>,
    pub last_price: Option<Price>,
}

impl MarketStats {
    pub fn empty(pair: CurrencyPair, window_start: i64, window_end: i64) -> Self {
        Self {
            pair,
            window_start,
            window_end,
            total_trades: 0,
            total_volume: Decimal::ZERO,
            total_value: Decimal::ZERO,
            avg_price: None,
            min_price: None,
            max_price: None,
            vwap: None,
            last_price: None,
        }
    }

    /// Aggregate `events` (oldest first) of `pair` that fall in the window
    pub fn aggregate<'a>(
        pair: &CurrencyPair,
        events: impl IntoIterator<Item = &'a MatchEvent>,
        window_start: i64,
        window_end: i64,
    ) -> Self {
        let mut stats = Self::empty(pair.clone(), window_start, window_end);
        let mut price_sum = Decimal::ZERO;

        for event in events.into_iter().filter(|e| &e.pair == pair) {
            stats.last_price = Some(event.price_per_unit);
            if event.created_at < window_start || event.created_at > window_end {
                continue;
            }
            let price = event.price_per_unit;
            stats.min_price = Some(stats.min_price.map_or(price, |low| low.min(price)));
            stats.max_price = Some(stats.max_price.map_or(price, |high| high.max(price)));
            stats.total_trades += 1;
            stats.total_volume += event.amount.as_decimal();
            stats.total_value += event.total_value;
            price_sum += price.as_decimal();
        }

        if stats.total_trades > 0 {
            let count = Decimal::from(stats.total_trades);
            stats.avg_price = Some((price_sum / count).round_dp(MAX_SCALE));
            if !stats.total_volume.is_zero() {
                stats.vwap = Some((stats.total_value / stats.total_volume).round_dp(MAX_SCALE));
            }
        }
        stats
    }

    /// Price range sanity check
    pub fn is_valid(&self) -> bool {
        match (self.min_price, self.max_price, self.avg_price) {
            (Some(low), Some(high), Some(avg)) => {
                low <= high && avg >= low.as_decimal() && avg <= high.as_decimal()
            }
            (None, None, None) => self.total_trades == 0,
            _ => false,
        }
    }
}
