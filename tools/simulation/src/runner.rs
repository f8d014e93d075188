//! Multi-threaded simulation runner
//!
//! Registers and funds one user per bot, then runs every bot on its own
//! thread against a single shared `Exchange`. Fiat funding goes through the
//! payment desk as a settled deposit; crypto is credited directly.

use crate::audit::{self, capture_supply};
use crate::bots::{Bot, MarketMaker, RetailTrader};
use crate::config::SimConfig;
use crate::export::SimulationReport;
use crate::metrics::SimMetrics;
use anyhow::{anyhow, Result};
use ledger::payments::PaymentOutcome;
use matching_engine::Exchange;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};
use types::errors::ErrorKind;
use types::ids::UserId;
use types::market::{Currency, CurrencyKind, CurrencyPair};

/// First bot user id; lower ids are left for the fee account and admins
const FIRST_BOT_USER: u64 = 1_000;
/// Settles seeding deposits
const ADMIN: UserId = UserId::new(2);

pub struct Simulation {
    config: SimConfig,
    pair: CurrencyPair,
    exchange: Arc<Exchange>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let exchange = Exchange::with_system_clock(config.exchange.clone())?;
        Self::with_exchange(config, Arc::new(exchange))
    }

    /// Run against an existing exchange, e.g. one driven by a manual clock
    pub fn with_exchange(config: SimConfig, exchange: Arc<Exchange>) -> Result<Self> {
        let pair = config.market()?;
        Ok(Self {
            config,
            pair,
            exchange,
        })
    }

    pub fn exchange(&self) -> &Arc<Exchange> {
        &self.exchange
    }

    /// Register every bot user and fund it with both legs of the pair
    pub fn seed_users(&self) -> Result<Vec<UserId>> {
        let users: Vec<UserId> = (0..self.config.bot_count() as u64)
            .map(|i| UserId::new(FIRST_BOT_USER + i))
            .collect();
        for user in &users {
            self.exchange.register_user(*user);
            self.deposit(*user, &self.pair.quote, self.config.quote_deposit)?;
            self.deposit(*user, &self.pair.base, self.config.base_deposit)?;
        }
        info!(users = users.len(), pair = %self.pair, "bot users funded");
        Ok(users)
    }

    fn deposit(&self, user: UserId, currency: &Currency, amount: Decimal) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let kind = self.exchange.ledger().registry().kind(currency);
        if kind == Some(CurrencyKind::Fiat) {
            let payments = self.exchange.payments();
            let request = payments.request_deposit(user, currency, amount, "simulation")?;
            payments.settle(request.id, ADMIN, PaymentOutcome::Completed, None)?;
        } else {
            self.exchange.ledger().credit(user, currency, amount)?;
        }
        Ok(())
    }

    fn build_bots(&self, users: &[UserId]) -> Vec<Box<dyn Bot>> {
        users
            .iter()
            .enumerate()
            .map(|(i, user)| {
                let seed = self.config.seed.wrapping_add(i as u64);
                if i < self.config.market_makers {
                    Box::new(MarketMaker::new(*user, self.config.market_maker.clone(), seed))
                        as Box<dyn Bot>
                } else {
                    Box::new(RetailTrader::new(*user, self.config.retail.clone(), seed))
                }
            })
            .collect()
    }

    /// Seed users, run all bots to completion, and audit the result
    pub fn run(&self) -> Result<SimulationReport> {
        let users = self.seed_users()?;
        let supply = capture_supply(&self.exchange);
        let bots = self.build_bots(&users);

        info!(
            bots = bots.len(),
            ticks = self.config.ticks,
            seed = self.config.seed,
            "simulation started"
        );
        let started = Instant::now();
        let handles: Vec<_> = bots
            .into_iter()
            .map(|bot| {
                let worker = Worker {
                    exchange: self.exchange.clone(),
                    pair: self.pair.clone(),
                    reference_price: self.config.reference_price,
                    base_deposit: self.config.base_deposit,
                };
                let ticks = self.config.ticks;
                thread::spawn(move || worker.drive(bot, ticks))
            })
            .collect();

        let mut metrics = SimMetrics::new();
        for handle in handles {
            let bot_metrics = handle
                .join()
                .map_err(|_| anyhow!("bot thread panicked"))?;
            metrics.merge(&bot_metrics);
        }
        metrics.set_elapsed(u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX));

        let audit = audit::audit(&self.exchange, &supply);
        if !audit.is_clean() {
            warn!(violations = audit.violations.len(), "invariant audit failed");
        }
        info!(summary = %metrics.summary(), "simulation finished");

        let stats = self.exchange.market_stats(&self.pair.base, &self.pair.quote);
        let depth = self.exchange.order_book(&self.pair.base, &self.pair.quote, 10);
        Ok(SimulationReport::new(
            &self.config,
            self.pair.clone(),
            metrics,
            stats,
            depth,
            audit,
        ))
    }
}

/// Per-thread view of the exchange
struct Worker {
    exchange: Arc<Exchange>,
    pair: CurrencyPair,
    reference_price: Decimal,
    base_deposit: Decimal,
}

impl Worker {
    fn drive(&self, mut bot: Box<dyn Bot>, ticks: usize) -> SimMetrics {
        let mut metrics = SimMetrics::new();
        let user = bot.user_id();
        for _ in 0..ticks {
            for order_id in bot.pending_cancels() {
                match self.exchange.cancel_order(order_id, user) {
                    Ok(_) => metrics.record_cancel(),
                    // filled by another bot in the meantime
                    Err(e) if e.kind() == ErrorKind::NotCancellable => {}
                    Err(e) => debug!(user_id = %user, error = %e, "cancel failed"),
                }
            }
            if let Some(base) = self.exchange.ledger().wallet(user, &self.pair.base) {
                bot.observe_inventory(base.total() - self.base_deposit);
            }

            let mid = self.mid_price();
            for order in bot.decide(mid) {
                let started = Instant::now();
                let result = self.exchange.submit_order(
                    user,
                    order.side,
                    &self.pair.base,
                    &self.pair.quote,
                    order.amount,
                    order.price,
                );
                metrics.record_latency(u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX));
                match result {
                    Ok(result) => {
                        metrics.record_result(&result);
                        bot.on_accepted(&result);
                    }
                    Err(e) => {
                        debug!(user_id = %user, error = %e, "order rejected");
                        metrics.record_rejection(e.kind());
                    }
                }
            }
        }
        metrics
    }

    /// Midpoint of the best quotes, the last trade, or the reference price
    fn mid_price(&self) -> Decimal {
        let depth = self.exchange.order_book(&self.pair.base, &self.pair.quote, 1);
        match (depth.bids.first(), depth.asks.first()) {
            (Some((bid, _)), Some((ask, _))) => {
                ((bid.as_decimal() + ask.as_decimal()) / Decimal::TWO).round_dp(2)
            }
            _ => self
                .exchange
                .public_trades(&self.pair.base, &self.pair.quote, Some(1))
                .first()
                .map(|trade| trade.price.as_decimal())
                .unwrap_or(self.reference_price),
        }
    }
}
