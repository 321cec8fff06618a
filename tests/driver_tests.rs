//! Trace-driver loop tests, end to end against the real memory system.

use dramsim::config::{Config, DeviceParams, SystemParams};
use dramsim::mem::system::MemorySystem;
use dramsim::sim::driver::{self, DriverState};
use dramsim::sim::trace::TraceFormat;
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

fn system() -> MemorySystem {
    let cfg = Config::resolve(DeviceParams::default(), SystemParams::default(), 2048).unwrap();
    MemorySystem::with_config(cfg)
}

fn driver_state(system: &mut MemorySystem) -> Rc<RefCell<DriverState>> {
    let state = Rc::new(RefCell::new(DriverState::new(true)));
    driver::register_driver_callbacks(system, state.clone());
    state
}

/// The KISS loop consumes the whole trace and spins until every
/// transaction has returned.
#[test]
fn test_kiss_loop_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiss_short.txt");
    fs::write(
        &path,
        "# cycle op addr\n0 0 0\n5 1 4096\n10 0 8192\n",
    )
    .unwrap();

    let mut system = system();
    let state = driver_state(&mut system);
    driver::run_kiss(&mut system, &state, &path, 0).unwrap();

    let s = state.borrow();
    assert_eq!(s.complete, 3);
    assert_eq!(s.pending, 0);
    assert_eq!(s.trace_cycles, 10);
    assert!(s.final_cycles > 0);
}

/// `end_trans` stops the KISS loop after the requested acceptance count.
#[test]
fn test_kiss_end_trans_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiss_long.txt");
    let mut text = String::new();
    for i in 0..20u64 {
        text.push_str(&format!("{} {} {}\n", i, i % 2, i * 4096));
    }
    fs::write(&path, text).unwrap();

    let mut system = system();
    let state = driver_state(&mut system);
    driver::run_kiss(&mut system, &state, &path, 5).unwrap();
    assert_eq!(state.borrow().complete, 5);
}

/// The cycle-driven loop honors trace cycles and runs exactly the
/// requested number of host cycles.
#[test]
fn test_cycle_driven_loop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k6_short.trc");
    fs::write(&path, "0x0 P_MEM_RD 0\n0x10000 P_MEM_WR 2\n").unwrap();

    let mut system = system();
    let state = driver_state(&mut system);
    driver::run_cycle_driven(&mut system, &state, &path, TraceFormat::K6, 100, true, 0).unwrap();

    let s = state.borrow();
    assert_eq!(s.complete, 2);
    assert_eq!(s.pending, 0);
    assert_eq!(system.cycle(), 100);
}

/// A malformed trace line aborts the run with its line number.
#[test]
fn test_cycle_driven_reports_bad_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k6_bad.trc");
    fs::write(&path, "0x0 P_MEM_RD 0\n0x10 NOT_A_COMMAND 1\n").unwrap();

    let mut system = system();
    let state = driver_state(&mut system);
    let err = driver::run_cycle_driven(&mut system, &state, &path, TraceFormat::K6, 100, true, 0)
        .unwrap_err();
    assert!(err.to_string().contains("line 2"));
}

/// A missing trace file is an error, not a panic.
#[test]
fn test_missing_trace_file() {
    let mut system = system();
    let state = driver_state(&mut system);
    let err = driver::run_kiss(
        &mut system,
        &state,
        std::path::Path::new("/no/such/trace.txt"),
        0,
    )
    .unwrap_err();
    assert!(err.to_string().contains("could not open"));
}
