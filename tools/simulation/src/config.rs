//! Simulation configuration
//!
//! Optional TOML file; every field has a default. The `[exchange]` table
//! takes the same keys as the exchange configuration.

use crate::bots::{MarketMakerConfig, RetailTraderConfig};
use anyhow::{ensure, Context, Result};
use matching_engine::ExchangeConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use types::ids::UserId;
use types::market::CurrencyPair;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed of the first bot; bot `i` uses `seed + i`
    pub seed: u64,
    /// Traded pair; the first listed exchange pair when unset
    pub pair: Option<CurrencyPair>,
    /// Mid price used while one side of the book is empty
    pub reference_price: Decimal,
    /// Ticks per bot
    pub ticks: usize,
    pub market_makers: usize,
    pub retail_traders: usize,
    /// Seeded into every bot at start
    pub quote_deposit: Decimal,
    pub base_deposit: Decimal,
    pub market_maker: MarketMakerConfig,
    pub retail: RetailTraderConfig,
    pub exchange: ExchangeConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            pair: None,
            reference_price: Decimal::from(2_000_000),
            ticks: 500,
            market_makers: 2,
            retail_traders: 8,
            quote_deposit: Decimal::from(10_000_000),
            base_deposit: Decimal::from(5),
            market_maker: MarketMakerConfig::default(),
            retail: RetailTraderConfig::default(),
            exchange: ExchangeConfig {
                fee_account: Some(UserId::new(1)),
                ..ExchangeConfig::default()
            },
        }
    }
}

impl SimConfig {
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("loading {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content).context("parsing simulation config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.exchange.validate()?;
        self.exchange.registry()?.ensure_pair(&self.market()?)?;
        ensure!(self.ticks > 0, "ticks must be positive");
        ensure!(
            self.market_makers + self.retail_traders > 0,
            "at least one bot is required"
        );
        ensure!(
            self.reference_price > Decimal::ZERO,
            "reference_price must be positive"
        );
        ensure!(
            self.quote_deposit >= Decimal::ZERO && self.base_deposit >= Decimal::ZERO,
            "deposits must not be negative"
        );
        ensure!(
            self.market_maker.order_size > Decimal::ZERO,
            "market_maker.order_size must be positive"
        );
        ensure!(
            self.retail.min_size > Decimal::ZERO && self.retail.min_size <= self.retail.max_size,
            "retail sizes must satisfy 0 < min_size <= max_size"
        );
        Ok(())
    }

    pub fn market(&self) -> Result<CurrencyPair> {
        self.pair
            .clone()
            .or_else(|| self.exchange.pairs.first().cloned())
            .context("no trading pair configured")
    }

    pub fn bot_count(&self) -> usize {
        self.market_makers + self.retail_traders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.bot_count(), 10);
        assert_eq!(config.market().unwrap().to_string(), "BTC/THB");
    }

    #[test]
    fn test_partial_toml() {
        let config = SimConfig::from_toml_str(
            r#"
            seed = 7
            ticks = 50
            reference_price = "60000"

            [pair]
            base = "ETH"
            quote = "USDT"

            [market_maker]
            spread_bps = 40

            [exchange]
            fee_rate = "0.002"
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.market().unwrap().to_string(), "ETH/USDT");
        assert_eq!(config.market_maker.spread_bps, 40);
        assert_eq!(config.market_maker.max_open_orders, 10);
        assert_eq!(config.exchange.fee_rate, dec!(0.002));
        // a table replaces the default exchange config, so no fee account
        assert_eq!(config.exchange.fee_account, None);
    }

    #[test]
    fn test_unlisted_pair_rejected() {
        let err = SimConfig::from_toml_str(
            r#"
            [pair]
            base = "THB"
            quote = "BTC"
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_zero_ticks_rejected() {
        assert!(SimConfig::from_toml_str("ticks = 0").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retail_traders = 3").unwrap();
        let config = SimConfig::load_file(file.path()).unwrap();
        assert_eq!(config.retail_traders, 3);

        assert!(SimConfig::load_file("/nonexistent/sim.toml").is_err());
    }
}
