//! Threaded simulation runs
//!
//! Every run must leave the exchange in a state that passes the audit,
//! whatever interleaving the bot threads produced.

use proptest::prelude::*;
use rust_decimal_macros::dec;
use simulation::bots::MarketMakerConfig;
use simulation::{SimConfig, Simulation};

fn config(seed: u64, ticks: usize) -> SimConfig {
    SimConfig {
        seed,
        ticks,
        market_makers: 2,
        retail_traders: 6,
        ..SimConfig::default()
    }
}

// ═══════════════════════════════════════════════════════════════════
// Audit
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_default_mix_is_clean() {
    let report = Simulation::new(config(42, 150)).unwrap().run().unwrap();

    assert!(report.audit.is_clean(), "{:?}", report.audit.violations);
    assert_eq!(report.bots, 8);
    assert!(report.metrics.total_orders > 0);
    assert_eq!(report.stats.total_trades, report.metrics.total_trades);
    assert!(report.stats.is_valid());
}

#[test]
fn test_repeated_runs_stay_clean() {
    for seed in 0..5 {
        let report = Simulation::new(config(seed, 60)).unwrap().run().unwrap();
        assert!(report.audit.is_clean(), "seed {seed}: {:?}", report.audit.violations);
    }
}

#[test]
fn test_underfunded_bots_get_rejections_not_violations() {
    let config = SimConfig {
        quote_deposit: dec!(1000),
        base_deposit: dec!(0.001),
        ..config(7, 80)
    };
    let report = Simulation::new(config).unwrap().run().unwrap();

    assert!(report.audit.is_clean(), "{:?}", report.audit.violations);
    assert!(report.metrics.rejected_orders > 0);
    assert!(report.metrics.rejections.contains_key("INSUFFICIENT_BALANCE"));
}

#[test]
fn test_market_makers_only() {
    let config = SimConfig {
        market_makers: 4,
        retail_traders: 0,
        market_maker: MarketMakerConfig {
            spread_bps: 10,
            ..MarketMakerConfig::default()
        },
        ..config(3, 50)
    };
    let report = Simulation::new(config).unwrap().run().unwrap();

    assert!(report.audit.is_clean(), "{:?}", report.audit.violations);
    assert!(!report.depth.bids.is_empty() || !report.depth.asks.is_empty());
}

// ═══════════════════════════════════════════════════════════════════
// Property: any seed
// ═══════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_any_seed_is_clean(seed in any::<u64>()) {
        let report = Simulation::new(config(seed, 25)).unwrap().run().unwrap();
        prop_assert!(report.audit.is_clean(), "{:?}", report.audit.violations);
    }
}
