//! Performance metrics for simulation
//!
//! Tracks accepted and rejected orders, trades, cancels, latency histograms,
//! and throughput. Each bot thread keeps its own copy; the runner merges them.

use matching_engine::{OrderResult, OrderState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::errors::ErrorKind;

/// Latency histogram bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyBucket {
    pub label: String,
    pub lower_ns: u64,
    pub upper_ns: u64,
    pub count: u64,
}

/// Aggregated simulation metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimMetrics {
    pub total_orders: u64,
    pub rejected_orders: u64,
    /// Rejections by error code
    pub rejections: BTreeMap<String, u64>,
    pub total_trades: u64,
    /// Orders filled completely on entry
    pub total_fills: u64,
    /// Orders left resting after entry
    pub total_resting: u64,
    pub total_cancels: u64,
    /// Base volume traded
    pub total_volume: Decimal,
    /// Quote value traded
    pub total_value: Decimal,
    /// Buyer and seller fees, quote units
    pub total_fees: Decimal,
    pub latency_buckets: Vec<LatencyBucket>,
    pub elapsed_ns: u64,
}

impl SimMetrics {
    /// Create empty metrics with default latency buckets.
    pub fn new() -> Self {
        Self {
            total_orders: 0,
            rejected_orders: 0,
            rejections: BTreeMap::new(),
            total_trades: 0,
            total_fills: 0,
            total_resting: 0,
            total_cancels: 0,
            total_volume: Decimal::ZERO,
            total_value: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            latency_buckets: default_buckets(),
            elapsed_ns: 0,
        }
    }

    /// Record an accepted order and the trades it took.
    pub fn record_result(&mut self, result: &OrderResult) {
        self.total_orders += 1;
        match result.state {
            OrderState::Filled => self.total_fills += 1,
            OrderState::Resting => self.total_resting += 1,
        }
        for trade in &result.trades {
            self.total_trades += 1;
            self.total_volume += trade.amount.as_decimal();
            self.total_value += trade.total_value;
            self.total_fees += trade.buyer_fee + trade.seller_fee * trade.price_per_unit.as_decimal();
        }
    }

    pub fn record_rejection(&mut self, kind: ErrorKind) {
        self.rejected_orders += 1;
        *self.rejections.entry(kind.as_str().to_string()).or_default() += 1;
    }

    pub fn record_cancel(&mut self) {
        self.total_cancels += 1;
    }

    /// Record latency in nanoseconds.
    pub fn record_latency(&mut self, latency_ns: u64) {
        for bucket in &mut self.latency_buckets {
            if latency_ns >= bucket.lower_ns && latency_ns < bucket.upper_ns {
                bucket.count += 1;
                return;
            }
        }
        // Overflow bucket (last)
        if let Some(last) = self.latency_buckets.last_mut() {
            last.count += 1;
        }
    }

    /// Fold another thread's counters into this one.
    pub fn merge(&mut self, other: &SimMetrics) {
        self.total_orders += other.total_orders;
        self.rejected_orders += other.rejected_orders;
        for (code, count) in &other.rejections {
            *self.rejections.entry(code.clone()).or_default() += count;
        }
        self.total_trades += other.total_trades;
        self.total_fills += other.total_fills;
        self.total_resting += other.total_resting;
        self.total_cancels += other.total_cancels;
        self.total_volume += other.total_volume;
        self.total_value += other.total_value;
        self.total_fees += other.total_fees;
        for (mine, theirs) in self.latency_buckets.iter_mut().zip(&other.latency_buckets) {
            mine.count += theirs.count;
        }
        self.elapsed_ns = self.elapsed_ns.max(other.elapsed_ns);
    }

    /// Set elapsed time.
    pub fn set_elapsed(&mut self, ns: u64) {
        self.elapsed_ns = ns;
    }

    /// Throughput: orders per second, rejected ones included.
    pub fn orders_per_second(&self) -> f64 {
        if self.elapsed_ns == 0 {
            return 0.0;
        }
        (self.total_orders + self.rejected_orders) as f64 / (self.elapsed_ns as f64 / 1_000_000_000.0)
    }

    /// Throughput: trades per second.
    pub fn trades_per_second(&self) -> f64 {
        if self.elapsed_ns == 0 {
            return 0.0;
        }
        self.total_trades as f64 / (self.elapsed_ns as f64 / 1_000_000_000.0)
    }

    /// Build a summary string.
    pub fn summary(&self) -> String {
        format!(
            "Orders: {} | Rejected: {} | Trades: {} | Cancels: {} | Volume: {} | Fees: {} | Throughput: {:.0} orders/s",
            self.total_orders,
            self.rejected_orders,
            self.total_trades,
            self.total_cancels,
            self.total_volume,
            self.total_fees,
            self.orders_per_second(),
        )
    }
}

impl Default for SimMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Default latency histogram buckets.
fn default_buckets() -> Vec<LatencyBucket> {
    vec![
        LatencyBucket { label: "<1μs".into(), lower_ns: 0, upper_ns: 1_000, count: 0 },
        LatencyBucket { label: "1-10μs".into(), lower_ns: 1_000, upper_ns: 10_000, count: 0 },
        LatencyBucket { label: "10-100μs".into(), lower_ns: 10_000, upper_ns: 100_000, count: 0 },
        LatencyBucket { label: "100-500μs".into(), lower_ns: 100_000, upper_ns: 500_000, count: 0 },
        LatencyBucket { label: "500μs-1ms".into(), lower_ns: 500_000, upper_ns: 1_000_000, count: 0 },
        LatencyBucket { label: "1-10ms".into(), lower_ns: 1_000_000, upper_ns: 10_000_000, count: 0 },
        LatencyBucket { label: ">10ms".into(), lower_ns: 10_000_000, upper_ns: u64::MAX, count: 0 },
    ]
}
