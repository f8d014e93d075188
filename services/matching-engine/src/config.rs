//! Exchange configuration
//!
//! Loaded from TOML. Decimal values are written as strings
//! (`fee_rate = "0.001"`) so they parse without going through floats.
//!
//! ```toml
//! fee_rate = "0.002"
//! fee_account = 1
//!
//! [[currencies]]
//! code = "THB"
//! kind = "fiat"
//!
//! [[pairs]]
//! base = "BTC"
//! quote = "THB"
//!
//! [min_deposits]
//! THB = "100"
//!
//! [limits]
//! user_orders = 50
//! ```

use ledger::PaymentPolicy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;
use types::fee::FeeSchedule;
use types::ids::UserId;
use types::market::{Currency, CurrencyKind, CurrencyPair, MarketRegistry};
use types::query::{DEFAULT_PUBLIC_LIMIT, DEFAULT_USER_LIMIT};

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A supported currency and its kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyConfig {
    pub code: Currency,
    pub kind: CurrencyKind,
}

/// Page sizes and the statistics window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub user_orders: usize,
    pub user_trades: usize,
    pub public_trades: usize,
    pub payments: usize,
    pub stats_window_secs: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            user_orders: DEFAULT_USER_LIMIT,
            user_trades: DEFAULT_USER_LIMIT,
            public_trades: DEFAULT_PUBLIC_LIMIT,
            payments: DEFAULT_USER_LIMIT,
            stats_window_secs: 86_400,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Flat fee rate charged on both sides of every trade
    pub fee_rate: Decimal,
    /// User credited with collected fees; fees are retained off-ledger when unset
    pub fee_account: Option<UserId>,
    pub currencies: Vec<CurrencyConfig>,
    pub pairs: Vec<CurrencyPair>,
    pub min_deposits: BTreeMap<Currency, Decimal>,
    pub limits: Limits,
}

const FIAT: [&str; 2] = ["THB", "USD"];
const CRYPTO: [&str; 5] = ["USDT", "BTC", "ETH", "DOGE", "XRP"];

impl Default for ExchangeConfig {
    fn default() -> Self {
        let currency = |code: &str| Currency::new(code).ok();
        let mut currencies = Vec::new();
        for code in FIAT {
            if let Some(code) = currency(code) {
                currencies.push(CurrencyConfig { code, kind: CurrencyKind::Fiat });
            }
        }
        for code in CRYPTO {
            if let Some(code) = currency(code) {
                currencies.push(CurrencyConfig { code, kind: CurrencyKind::Crypto });
            }
        }

        let mut pairs = Vec::new();
        for base in CRYPTO.iter().filter(|code| **code != "USDT") {
            for quote in ["THB", "USD", "USDT"] {
                if let Ok(pair) = CurrencyPair::parse(base, quote) {
                    pairs.push(pair);
                }
            }
        }

        Self {
            fee_rate: FeeSchedule::DEFAULT_RATE,
            fee_account: None,
            currencies,
            pairs,
            min_deposits: PaymentPolicy::default().min_deposits,
            limits: Limits::default(),
        }
    }
}

impl ExchangeConfig {
    /// Load and validate a TOML file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text; omitted fields take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ExchangeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::new(1, 1) {
            return Err(ConfigError::Invalid(format!(
                "fee_rate {} must be in [0, 0.1)",
                self.fee_rate
            )));
        }
        if self.currencies.is_empty() {
            return Err(ConfigError::Invalid("no currencies configured".to_string()));
        }
        let mut seen = BTreeSet::new();
        for currency in &self.currencies {
            if !seen.insert(&currency.code) {
                return Err(ConfigError::Invalid(format!(
                    "currency {} listed twice",
                    currency.code
                )));
            }
        }
        for (currency, minimum) in &self.min_deposits {
            if !seen.contains(currency) {
                return Err(ConfigError::Invalid(format!(
                    "deposit minimum for unknown currency {currency}"
                )));
            }
            if *minimum < Decimal::ZERO {
                return Err(ConfigError::Invalid(format!(
                    "deposit minimum for {currency} is negative"
                )));
            }
        }
        let limits = &self.limits;
        if limits.user_orders == 0
            || limits.user_trades == 0
            || limits.public_trades == 0
            || limits.payments == 0
            || limits.stats_window_secs == 0
        {
            return Err(ConfigError::Invalid("limits must be positive".to_string()));
        }
        self.registry().map(|_| ())
    }

    /// Currency/pair validity table
    pub fn registry(&self) -> Result<MarketRegistry, ConfigError> {
        let mut registry = MarketRegistry::new();
        for currency in &self.currencies {
            registry.add_currency(currency.code.clone(), currency.kind);
        }
        for pair in &self.pairs {
            registry
                .add_pair(pair.clone())
                .map_err(|e| ConfigError::Invalid(format!("pair {pair}: {e}")))?;
        }
        Ok(registry)
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::new(self.fee_rate)
    }

    pub fn payment_policy(&self) -> PaymentPolicy {
        PaymentPolicy {
            min_deposits: self.min_deposits.clone(),
            default_limit: self.limits.payments,
        }
    }
}
