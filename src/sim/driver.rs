//! Trace-driven run loops.
//!
//! The driver owns everything outside the memory system: per-address
//! pending FIFOs, throttle accounting, and the two simulation loops. A
//! parsed transaction the system has not yet accepted is held in an
//! `Option` and moved out only on acceptance, so exactly one owner exists
//! at any moment.

use crate::mem::system::MemorySystem;
use crate::mem::transaction::{Completion, Transaction, TransactionKind};
use crate::sim::trace::{self, TraceFormat};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::process;
use std::rc::Rc;

/// Stop accepting new work above this many outstanding transactions.
const MAX_PENDING: u64 = 1024;
/// Resume once outstanding transactions fall below this.
const MIN_PENDING: u64 = 1023;
/// Print progress at least every this many DRAM cycles.
const PROGRESS_CYCLE_GAP: u64 = 1_000_000;

/// Driver-side bookkeeping, previously process globals in older tools.
pub struct DriverState {
    pending_reads: BTreeMap<u64, VecDeque<u64>>,
    pending_writes: BTreeMap<u64, VecDeque<u64>>,
    pub complete: u64,
    pub pending: u64,
    pub throttle_count: u64,
    pub throttle_cycles: u64,
    pub final_cycles: u64,
    pub trace_cycles: u64,
    last_report_cycle: u64,
    quiet: bool,
}

impl DriverState {
    pub fn new(quiet: bool) -> Self {
        Self {
            pending_reads: BTreeMap::new(),
            pending_writes: BTreeMap::new(),
            complete: 0,
            pending: 0,
            throttle_count: 0,
            throttle_cycles: 0,
            final_cycles: 0,
            trace_cycles: 0,
            last_report_cycle: 0,
            quiet,
        }
    }

    /// Records an accepted transaction. FIFO order per address mirrors the
    /// completion order the core guarantees.
    pub fn add_pending(&mut self, kind: TransactionKind, address: u64, cycle: u64) {
        let map = match kind {
            TransactionKind::Read => &mut self.pending_reads,
            TransactionKind::Write => &mut self.pending_writes,
        };
        map.entry(address).or_default().push_back(cycle);
        self.pending += 1;
    }

    /// Accounts one completion. A completion for an address with nothing
    /// pending means the bookkeeping and the core disagree, which is fatal
    /// here.
    pub fn complete_one(&mut self, completion: &Completion) {
        let map = match completion.kind {
            TransactionKind::Read => &mut self.pending_reads,
            TransactionKind::Write => &mut self.pending_writes,
        };
        let queue = map.get_mut(&completion.address).filter(|q| !q.is_empty());
        let Some(queue) = queue else {
            eprintln!(
                "[!] FATAL: {} completion for address {:#x} with nothing pending",
                completion.kind, completion.address
            );
            process::exit(1);
        };
        queue.pop_front();
        self.complete += 1;
        self.pending -= 1;

        if !self.quiet
            && (self.complete % 1000 == 0
                || completion.done_cycle - self.last_report_cycle > PROGRESS_CYCLE_GAP)
        {
            println!(
                "complete= {}\t\tpending= {}\t\tcycle_count= {}\t\tthrottle_count= {}",
                self.complete, self.pending, completion.done_cycle, self.throttle_count
            );
            self.last_report_cycle = completion.done_cycle;
        }
    }
}

/// Wires the driver's accounting into the memory system's callbacks.
pub fn register_driver_callbacks(system: &mut MemorySystem, state: Rc<RefCell<DriverState>>) {
    let on_read = {
        let state = state.clone();
        Box::new(move |c: Completion| state.borrow_mut().complete_one(&c))
    };
    let on_write = {
        let state = state.clone();
        Box::new(move |c: Completion| state.borrow_mut().complete_one(&c))
    };
    system.register_callbacks(on_read, on_write, None);
}

fn align_address(address: u64, transaction_bytes: u64) -> u64 {
    let bits = transaction_bytes.trailing_zeros();
    (address >> bits) << bits
}

fn open_trace(path: &Path) -> Result<Lines<BufReader<File>>, Box<dyn Error>> {
    let file = File::open(path)
        .map_err(|e| format!("could not open trace file '{}': {}", path.display(), e))?;
    Ok(BufReader::new(file).lines())
}

/// Runs the cycle-driven loop: exactly `num_cycles` host cycles, reading
/// one trace line ahead and holding it until its scheduled cycle arrives
/// and the system accepts it.
pub fn run_cycle_driven(
    system: &mut MemorySystem,
    state: &Rc<RefCell<DriverState>>,
    trace_path: &Path,
    format: TraceFormat,
    num_cycles: u64,
    use_clock_cycle: bool,
    end_trans: u64,
) -> Result<(), Box<dyn Error>> {
    let mut lines = open_trace(trace_path)?;
    let transaction_bytes = system.config().transaction_bytes;
    let mut line_no = 0usize;
    let mut held: Option<(u64, Transaction)> = None;
    let mut accepted = 0u64;

    for i in 0..num_cycles {
        if held.is_none() && (end_trans == 0 || accepted < end_trans) {
            for line in lines.by_ref() {
                let line = line?;
                line_no += 1;
                if let Some(record) = trace::parse_line(format, &line, line_no, use_clock_cycle)? {
                    let address = align_address(record.address, transaction_bytes);
                    held = Some((record.cycle, Transaction::new(record.kind, address, record.data)));
                    break;
                }
            }
        }

        if let Some((due, txn)) = held.take() {
            if i >= due {
                let kind = txn.kind;
                let address = txn.address;
                match system.add_transaction(txn) {
                    Ok(()) => {
                        state.borrow_mut().add_pending(kind, address, i);
                        accepted += 1;
                    }
                    Err(txn) => held = Some((due, txn)),
                }
            } else {
                held = Some((due, txn));
            }
        }

        system.update();
    }
    state.borrow_mut().trace_cycles = num_cycles;
    Ok(())
}

/// Runs the KISS loop: consume the whole trace, throttling when too much
/// is outstanding, then spin until every completion has returned.
pub fn run_kiss(
    system: &mut MemorySystem,
    state: &Rc<RefCell<DriverState>>,
    trace_path: &Path,
    end_trans: u64,
) -> Result<(), Box<dyn Error>> {
    let lines = open_trace(trace_path)?;
    let transaction_bytes = system.config().transaction_bytes;
    let mut accepted = 0u64;

    'trace: for (idx, line) in lines.enumerate() {
        let line = line?;
        let Some(record) = trace::parse_kiss_line(&line, idx + 1)? else {
            continue;
        };

        while state.borrow().trace_cycles < record.cycle {
            system.update();
            state.borrow_mut().trace_cycles += 1;
        }

        let address = align_address(record.address, transaction_bytes);
        let mut txn = Transaction::new(record.kind, address, record.data);
        loop {
            match system.add_transaction(txn) {
                Ok(()) => {
                    let cycle = state.borrow().trace_cycles;
                    state.borrow_mut().add_pending(record.kind, address, cycle);
                    accepted += 1;
                    break;
                }
                Err(back) => {
                    txn = back;
                    system.update();
                    state.borrow_mut().throttle_cycles += 1;
                }
            }
        }

        if state.borrow().pending >= MAX_PENDING {
            state.borrow_mut().throttle_count += 1;
            while state.borrow().pending > MIN_PENDING {
                system.update();
                state.borrow_mut().throttle_cycles += 1;
            }
        }

        if end_trans != 0 && accepted >= end_trans {
            break 'trace;
        }
    }

    while state.borrow().pending > 0 {
        system.update();
        state.borrow_mut().final_cycles += 1;
    }

    let s = state.borrow();
    println!("trace_cycles = {}", s.trace_cycles);
    println!("throttle_count = {}", s.throttle_count);
    println!("throttle_cycles = {}", s.throttle_cycles);
    println!("final_cycles = {}", s.final_cycles);
    println!(
        "total_cycles = trace_cycles + throttle_cycles + final_cycles = {}\n",
        s.trace_cycles + s.throttle_cycles + s.final_cycles
    );
    Ok(())
}
