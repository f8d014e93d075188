//! Currencies, trading pairs and the pair validity table
//!
//! The registry is supplied by configuration and consulted before any
//! wallet is opened or any order is accepted.

use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Currency code, e.g. "BTC" or "THB"
///
/// Always uppercase ASCII alphanumerics, 2 to 10 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub const MIN_LEN: usize = 2;
    pub const MAX_LEN: usize = 10;

    /// Parse and normalize a currency code
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = code.as_ref().trim();
        let valid_len = (Self::MIN_LEN..=Self::MAX_LEN).contains(&code.len());
        if !valid_len || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidCurrencyCode(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a currency is a fiat or a crypto asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

/// Trading pair: `base` is traded, priced in `quote`
///
/// Format: "BASE/QUOTE" (e.g., "BTC/USDT", "ETH/THB")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: Currency,
    pub quote: Currency,
}

impl CurrencyPair {
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Parse both legs from raw codes
    pub fn parse(base: &str, quote: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(Currency::new(base)?, Currency::new(quote)?))
    }

    /// Symbol string, "BASE/QUOTE"
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((base, quote)) => Self::parse(base, quote),
            None => Err(ValidationError::UnsupportedPair(s.to_string())),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Supported currencies and tradable pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketRegistry {
    currencies: BTreeMap<Currency, CurrencyKind>,
    pairs: BTreeSet<CurrencyPair>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_currency(&mut self, currency: Currency, kind: CurrencyKind) {
        self.currencies.insert(currency, kind);
    }

    /// Register a pair; both legs must already be supported
    pub fn add_pair(&mut self, pair: CurrencyPair) -> Result<(), ValidationError> {
        self.ensure_currency(&pair.base)?;
        self.ensure_currency(&pair.quote)?;
        if pair.base == pair.quote {
            return Err(ValidationError::UnsupportedPair(pair.symbol()));
        }
        self.pairs.insert(pair);
        Ok(())
    }

    pub fn is_supported(&self, currency: &Currency) -> bool {
        self.currencies.contains_key(currency)
    }

    pub fn kind(&self, currency: &Currency) -> Option<CurrencyKind> {
        self.currencies.get(currency).copied()
    }

    pub fn ensure_currency(&self, currency: &Currency) -> Result<CurrencyKind, ValidationError> {
        self.kind(currency)
            .ok_or_else(|| ValidationError::UnsupportedCurrency(currency.to_string()))
    }

    pub fn ensure_pair(&self, pair: &CurrencyPair) -> Result<(), ValidationError> {
        if self.pairs.contains(pair) {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedPair(pair.symbol()))
        }
    }

    /// All supported currencies in code order
    pub fn currencies(&self) -> impl Iterator<Item = (&Currency, CurrencyKind)> {
        self.currencies.iter().map(|(c, k)| (c, *k))
    }

    pub fn pairs(&self) -> impl Iterator<Item = &CurrencyPair> {
        self.pairs.iter()
    }
}
