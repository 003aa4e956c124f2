mod common;

use std::{fs, sync::Arc, thread};

use bzk_config::{Config, ConfigManager};
use bzk_core::ManualClock;
use buzzkill::{BuzzkillError, Session};
use chrono::{Duration, TimeZone, Utc};
use common::temp_home;
use rust_decimal_macros::dec;

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 14, 20, 0, 0).unwrap(),
    ))
}

#[test]
fn session_restores_history_and_active_period() {
    let home = temp_home();
    let clock = clock();
    {
        let mut session = Session::open_with_clock(&home, clock.clone()).unwrap();
        session.start_period(Some(dec!(40)), "Thursday").unwrap();
        session
            .ledger()
            .record_transaction_now(dec!(9.20), "Negroni", "Bar Termini")
            .unwrap();
        clock.advance(Duration::hours(4));
        session.ledger().close_period().unwrap();
        session.start_period(Some(dec!(100)), "Saturday").unwrap();
        assert!(session.persistence_status().is_clean());
    }

    let session = Session::open_with_clock(&home, clock).unwrap();
    let ledger = session.ledger();
    let history = ledger.list_history(None, None);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].label, "Thursday");
    assert_eq!(history[0].spent, dec!(9.20));
    assert_eq!(history[0].remaining, dec!(30.80));
    let active = ledger.active_period().expect("active period restored");
    assert_eq!(active.summary.label, "Saturday");
    assert_eq!(session.config().last_limit, Some(dec!(100)));
}

#[test]
fn configured_data_root_moves_the_ledger() {
    let home = temp_home();
    let elsewhere = temp_home();
    ConfigManager::with_base_dir(&home)
        .unwrap()
        .save(&Config {
            data_root: Some(elsewhere.clone()),
            ..Config::default()
        })
        .unwrap();

    let mut session = Session::open(&home).unwrap();
    session.start_period(Some(dec!(25)), "Elsewhere").unwrap();

    assert!(elsewhere.join("ledger.json").exists());
    assert!(!home.join("ledger.json").exists());
    assert_eq!(session.ledger_path(), Some(elsewhere.join("ledger.json").as_path()));
}

#[test]
fn corrupt_ledger_file_is_rejected_on_open() {
    let home = temp_home();
    fs::write(home.join("ledger.json"), "{\"schema_version\": 99, \"saved_at\": \"2025-06-14T20:00:00Z\", \"history\": []}").unwrap();

    let err = Session::open(&home).err().expect("future schema must not load");
    assert!(matches!(
        err,
        BuzzkillError::Core(bzk_core::CoreError::UnsupportedSchema { found: 99, .. })
    ));
}

#[test]
fn handles_share_one_engine_across_threads() {
    let mut session = Session::in_memory();
    session.start_period(Some(dec!(500)), "Stag do").unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let ledger = session.ledger();
            thread::spawn(move || {
                for _ in 0..50 {
                    ledger
                        .record_transaction_now(dec!(1.25), "Round", "")
                        .expect("record");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker");
    }

    let view = session.ledger().active_period().unwrap();
    assert_eq!(view.summary.transaction_count, 200);
    assert_eq!(view.summary.spent, dec!(250.00));
    assert!(!view.summary.is_over_budget);
}

#[test]
fn restore_swaps_in_the_backup_state() {
    let home = temp_home();
    let mut session = Session::open(&home).unwrap();
    session.start_period(Some(dec!(60)), "Festival").unwrap();
    session
        .ledger()
        .record_transaction_now(dec!(20), "Wristband", "Gate")
        .unwrap();
    let backup = session.backup(Some("after entry")).unwrap();

    let stale = session.ledger();
    stale.record_transaction_now(dec!(15), "Burger", "Van").unwrap();
    assert_eq!(stale.active_period().unwrap().summary.spent, dec!(35));

    let restored = session.restore_backup(&backup.id).unwrap();
    assert_eq!(restored.active_period().unwrap().summary.spent, dec!(20));
    assert_eq!(session.ledger().active_period().unwrap().summary.spent, dec!(20));
    assert!(session.backups().unwrap().iter().any(|b| b.id == backup.id));
}
