//! Report export
//!
//! Serializes the outcome of a run to JSON for external consumption.

use crate::audit::AuditReport;
use crate::config::SimConfig;
use crate::metrics::SimMetrics;
use chrono::{DateTime, Utc};
use market_data::MarketStats;
use matching_engine::DepthSnapshot;
use serde::{Deserialize, Serialize};
use std::path::Path;
use types::market::CurrencyPair;

/// Combined export containing all simulation outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub pair: CurrencyPair,
    pub bots: usize,
    pub ticks: usize,
    pub metrics: SimMetrics,
    pub stats: MarketStats,
    pub depth: DepthSnapshot,
    pub audit: AuditReport,
}

impl SimulationReport {
    pub fn new(
        config: &SimConfig,
        pair: CurrencyPair,
        metrics: SimMetrics,
        stats: MarketStats,
        depth: DepthSnapshot,
        audit: AuditReport,
    ) -> Self {
        Self {
            version: crate::VERSION.to_string(),
            generated_at: Utc::now(),
            seed: config.seed,
            pair,
            bots: config.bot_count(),
            ticks: config.ticks,
            metrics,
            stats,
            depth,
            audit,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
