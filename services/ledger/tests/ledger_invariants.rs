//! Ledger invariant tests
//!
//! - Balances never go negative under arbitrary operation sequences
//! - lock/unlock round-trips exactly
//! - Concurrent transfers conserve the total and never overdraw
//! - Lock ordering: opposing transfers do not deadlock

use ledger::{Ledger, Posting, TransferDesk};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread;
use types::clock::{Clock, ManualClock};
use types::errors::LedgerError;
use types::ids::UserId;
use types::market::{Currency, CurrencyKind, MarketRegistry};

fn usdt() -> Currency {
    Currency::new("USDT").unwrap()
}

fn setup_ledger(users: u64, balance: Decimal) -> Arc<Ledger> {
    let mut registry = MarketRegistry::new();
    registry.add_currency(usdt(), CurrencyKind::Crypto);
    let ledger = Arc::new(Ledger::new(
        Arc::new(registry),
        Arc::new(ManualClock::new(0)),
    ));
    for user in 1..=users {
        ledger.create_wallet(UserId::new(user), &usdt()).unwrap();
        if !balance.is_zero() {
            ledger.credit(UserId::new(user), &usdt(), balance).unwrap();
        }
    }
    ledger
}

fn total(ledger: &Ledger) -> Decimal {
    ledger.all_wallets().iter().map(|w| w.total()).sum()
}

// ═══════════════════════════════════════════════════════════════════
// Property tests
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum Op {
    Credit(u64, Decimal),
    Debit(u64, Decimal),
    Lock(u64, Decimal),
    Unlock(u64, Decimal),
    DebitLocked(u64, Decimal),
    Transfer(u64, u64, Decimal),
}

fn amount() -> impl Strategy<Value = Decimal> {
    (1u64..50_000_000_000).prop_map(|units| Decimal::new(units as i64, 8))
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..4, amount()).prop_map(|(u, a)| Op::Credit(u, a)),
        (1u64..4, amount()).prop_map(|(u, a)| Op::Debit(u, a)),
        (1u64..4, amount()).prop_map(|(u, a)| Op::Lock(u, a)),
        (1u64..4, amount()).prop_map(|(u, a)| Op::Unlock(u, a)),
        (1u64..4, amount()).prop_map(|(u, a)| Op::DebitLocked(u, a)),
        (1u64..4, 1u64..4, amount()).prop_map(|(f, t, a)| Op::Transfer(f, t, a)),
    ]
}

proptest! {
    #[test]
    fn prop_wallets_never_negative(ops in proptest::collection::vec(op(), 1..60)) {
        let ledger = setup_ledger(3, Decimal::from(100));
        for op in ops {
            let before = ledger.all_wallets();
            let result = match op {
                Op::Credit(u, a) => ledger.credit(UserId::new(u), &usdt(), a).map(|_| ()),
                Op::Debit(u, a) => ledger.debit(UserId::new(u), &usdt(), a).map(|_| ()),
                Op::Lock(u, a) => ledger.lock(UserId::new(u), &usdt(), a).map(|_| ()),
                Op::Unlock(u, a) => ledger.unlock(UserId::new(u), &usdt(), a).map(|_| ()),
                Op::DebitLocked(u, a) => ledger.debit_locked(UserId::new(u), &usdt(), a).map(|_| ()),
                Op::Transfer(f, t, a) => ledger
                    .transfer(UserId::new(f), UserId::new(t), &usdt(), a)
                    .map(|_| ()),
            };
            for wallet in ledger.all_wallets() {
                prop_assert!(wallet.available >= Decimal::ZERO);
                prop_assert!(wallet.locked >= Decimal::ZERO);
            }
            if result.is_err() {
                prop_assert_eq!(ledger.all_wallets(), before);
            }
        }
    }

    #[test]
    fn prop_lock_unlock_round_trip(start in amount(), x in amount()) {
        let ledger = setup_ledger(1, start);
        let user = UserId::new(1);
        let before = ledger.wallet(user, &usdt()).unwrap();

        match ledger.lock(user, &usdt(), x) {
            Ok(_) => {
                ledger.unlock(user, &usdt(), x).unwrap();
            }
            Err(e) => prop_assert!(matches!(e, LedgerError::InsufficientBalance { .. }), "unexpected error: {:?}", e),
        }
        let after = ledger.wallet(user, &usdt()).unwrap();
        prop_assert_eq!(after.available, before.available);
        prop_assert_eq!(after.locked, before.locked);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Scenario: internal transfer drains a balance
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_second_transfer_on_empty_balance_fails() {
    let ledger = setup_ledger(2, Decimal::ZERO);
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
    let desk = TransferDesk::new(ledger.clone(), clock);
    let (x, y) = (UserId::new(1), UserId::new(2));
    ledger.credit(x, &usdt(), Decimal::from(50)).unwrap();

    desk.execute_transfer(x, y, &usdt(), Decimal::from(50), "first")
        .unwrap();
    assert_eq!(ledger.wallet(x, &usdt()).unwrap().available, Decimal::ZERO);
    assert_eq!(ledger.wallet(y, &usdt()).unwrap().available, Decimal::from(50));

    let err = desk
        .execute_transfer(x, y, &usdt(), Decimal::from(50), "second")
        .unwrap_err();
    assert_eq!(err.kind().as_str(), "INSUFFICIENT_BALANCE");
    assert_eq!(ledger.wallet(x, &usdt()).unwrap().available, Decimal::ZERO);
    assert_eq!(ledger.wallet(y, &usdt()).unwrap().available, Decimal::from(50));
}

// ═══════════════════════════════════════════════════════════════════
// Concurrency
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_concurrent_debits_never_overdraw() {
    let ledger = setup_ledger(1, Decimal::from(100));
    let user = UserId::new(1);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                (0..50)
                    .filter(|_| ledger.debit(user, &usdt(), Decimal::ONE).is_ok())
                    .count()
            })
        })
        .collect();
    let succeeded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(succeeded, 100);
    assert_eq!(ledger.wallet(user, &usdt()).unwrap().available, Decimal::ZERO);
}

#[test]
fn test_opposing_transfers_conserve_funds() {
    let ledger = setup_ledger(4, Decimal::from(1_000));
    let before = total(&ledger);

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                for i in 0..500u64 {
                    // threads walk the users in opposite directions
                    let from = (t + i) % 4 + 1;
                    let to = if t % 2 == 0 { from % 4 + 1 } else { (from + 2) % 4 + 1 };
                    let _ = ledger.transfer(
                        UserId::new(from),
                        UserId::new(to),
                        &usdt(),
                        Decimal::new(((t + i) % 7 + 1) as i64, 0),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(total(&ledger), before);
    for wallet in ledger.all_wallets() {
        assert!(wallet.check_invariant());
    }
}

#[test]
fn test_batch_spanning_users_under_contention() {
    let ledger = setup_ledger(2, Decimal::from(10));
    let (a, b) = (UserId::new(1), UserId::new(2));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                for _ in 0..200 {
                    let _ = ledger.apply(&[
                        Posting::lock(from, &usdt(), Decimal::ONE),
                        Posting::debit_locked(from, &usdt(), Decimal::ONE),
                        Posting::credit(to, &usdt(), Decimal::ONE),
                    ]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let sum = ledger.wallet(a, &usdt()).unwrap().available
        + ledger.wallet(b, &usdt()).unwrap().available;
    assert_eq!(sum, Decimal::from(20));
    assert_eq!(ledger.wallet(a, &usdt()).unwrap().locked, Decimal::ZERO);
}
