//! Bank state-machine tests: transitions, next-legal-cycle bookkeeping,
//! and the timed PRECHARGING/REFRESHING phases.

use dramsim::config::{Config, DeviceParams, SystemParams};
use dramsim::mem::bank::{BankPhase, BankState};

fn cfg() -> Config {
    Config::resolve(DeviceParams::default(), SystemParams::default(), 2048).unwrap()
}

/// ACTIVATE opens the row and arms the column and precharge gates.
#[test]
fn test_activate_opens_row() {
    let cfg = cfg();
    let mut bank = BankState::new();
    bank.activate(5, 42, &cfg);

    assert_eq!(bank.phase, BankPhase::RowActive);
    assert_eq!(bank.open_row, Some(42));
    assert_eq!(bank.next_read, 5 + cfg.trcd);
    assert_eq!(bank.next_write, 5 + cfg.trcd);
    assert_eq!(bank.next_precharge, 5 + cfg.tras);
    assert_eq!(bank.next_activate, 5 + cfg.trc);
    assert_eq!(bank.last_activate, 5);
}

/// A plain column read keeps the row open and pushes the precharge gate.
#[test]
fn test_read_keeps_row_open() {
    let cfg = cfg();
    let mut bank = BankState::new();
    bank.activate(0, 7, &cfg);
    bank.column_read(cfg.trcd, 7, false, &cfg);

    assert_eq!(bank.phase, BankPhase::RowActive);
    assert_eq!(bank.open_row, Some(7));
    // tRAS still dominates the read-to-precharge path here.
    assert_eq!(bank.next_precharge, cfg.tras);
}

/// Auto-precharge closes the row at issue and gates the next activate
/// behind the implicit precharge.
#[test]
fn test_read_autoprecharge_closes_row() {
    let cfg = cfg();
    let mut bank = BankState::new();
    bank.activate(0, 7, &cfg);
    bank.column_read(cfg.trcd, 7, true, &cfg);

    assert_eq!(bank.phase, BankPhase::Idle);
    assert_eq!(bank.open_row, None);
    assert!(bank.next_activate >= cfg.trcd + cfg.al + cfg.trtp + cfg.trp);
    // tRC from the original activate still applies.
    assert!(bank.next_activate >= cfg.trc);
}

/// Writes gate the precharge behind write recovery.
#[test]
fn test_write_recovery_gates_precharge() {
    let cfg = cfg();
    let mut bank = BankState::new();
    bank.activate(0, 3, &cfg);
    let t = cfg.trcd;
    bank.column_write(t, 3, false, &cfg);
    assert_eq!(
        bank.next_precharge,
        (t + cfg.write_latency + cfg.burst_cycles + cfg.twr).max(cfg.tras)
    );
}

/// PRECHARGE holds the bank in a timed closing phase for tRP cycles.
#[test]
fn test_precharge_timed_phase() {
    let cfg = cfg();
    let mut bank = BankState::new();
    bank.activate(0, 9, &cfg);
    bank.precharge(cfg.tras, &cfg);

    assert_eq!(bank.phase, BankPhase::Precharging);
    assert_eq!(bank.open_row, None);
    for _ in 0..cfg.trp - 1 {
        bank.step();
        assert_eq!(bank.phase, BankPhase::Precharging);
    }
    bank.step();
    assert_eq!(bank.phase, BankPhase::Idle);
    assert_eq!(bank.next_activate, cfg.tras + cfg.trp);
}

/// REFRESH blocks the bank for tRFC cycles.
#[test]
fn test_refresh_timed_phase() {
    let cfg = cfg();
    let mut bank = BankState::new();
    bank.refresh(0, &cfg);

    assert_eq!(bank.phase, BankPhase::Refreshing);
    assert_eq!(bank.next_activate, cfg.trfc);
    for _ in 0..cfg.trfc - 1 {
        bank.step();
        assert_eq!(bank.phase, BankPhase::Refreshing);
    }
    bank.step();
    assert_eq!(bank.phase, BankPhase::Idle);
    assert!(bank.ready_for_refresh(cfg.trfc));
}

/// Power-down parks an idle bank; exit reopens it behind tXP.
#[test]
fn test_power_down_round_trip() {
    let cfg = cfg();
    let mut bank = BankState::new();
    bank.power_down();
    assert_eq!(bank.phase, BankPhase::PowerDown);
    bank.power_up(100, &cfg);
    assert_eq!(bank.phase, BankPhase::Idle);
    assert_eq!(bank.next_activate, 100 + cfg.txp);
}

/// Driving an ACTIVATE into a non-idle bank is a scheduler bug and must
/// abort.
#[test]
#[should_panic(expected = "ACTIVATE")]
fn test_activate_while_active_panics() {
    let cfg = cfg();
    let mut bank = BankState::new();
    bank.activate(0, 1, &cfg);
    bank.activate(1, 2, &cfg);
}

/// Driving a column read at the wrong row is a scheduler bug and must
/// abort.
#[test]
#[should_panic(expected = "READ")]
fn test_read_wrong_row_panics() {
    let cfg = cfg();
    let mut bank = BankState::new();
    bank.activate(0, 1, &cfg);
    bank.column_read(cfg.trcd, 2, false, &cfg);
}

/// Driving a column read before tRCD has elapsed must abort.
#[test]
#[should_panic(expected = "READ")]
fn test_read_too_early_panics() {
    let cfg = cfg();
    let mut bank = BankState::new();
    bank.activate(0, 1, &cfg);
    bank.column_read(cfg.trcd - 1, 1, false, &cfg);
}
