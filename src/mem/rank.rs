//! Rank state.
//!
//! A rank is the set of banks behind one chip select. Besides its banks it
//! carries the rolling four-activation window that enforces tFAW, the
//! refresh deadline, the power state, and the FIFOs that model data coming
//! back over the I/O pins.

use crate::config::Config;
use crate::mem::bank::{BankPhase, BankState};
use std::collections::VecDeque;

/// CKE-level power state of the rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Active,
    /// Powered down since the given cycle; exit is legal tCKE later.
    PoweredDown { since: u64 },
}

/// A data burst in flight back to (or out of) the controller.
#[derive(Debug, Clone, Copy)]
pub struct PendingData {
    pub transaction_id: u64,
    /// Cycle the final beat crosses the pins.
    pub ready_cycle: u64,
}

/// One rank: banks plus rank-level bookkeeping.
#[derive(Debug)]
pub struct Rank {
    pub id: usize,
    pub banks: Vec<BankState>,
    /// Set when the refresh deadline passes; cleared when REFRESH issues.
    pub refresh_waiting: bool,
    /// Next refresh deadline in DRAM cycles.
    pub next_refresh: u64,
    pub power_state: PowerState,
    /// Read bursts heading back to the controller, in issue order.
    pub read_returns: VecDeque<PendingData>,
    /// Write bursts still being driven into the array, in issue order.
    pub write_returns: VecDeque<PendingData>,
    /// Issue cycles of up to the last four ACTIVATEs.
    activate_window: VecDeque<u64>,
}

impl Rank {
    /// Creates an idle rank. Refresh deadlines are staggered across ranks
    /// so the controller never has to refresh two ranks back to back.
    pub fn new(id: usize, cfg: &Config) -> Self {
        let stagger = cfg.t_refi / cfg.num_ranks;
        Self {
            id,
            banks: (0..cfg.num_banks).map(|_| BankState::new()).collect(),
            refresh_waiting: false,
            next_refresh: stagger * (id as u64 + 1),
            power_state: PowerState::Active,
            read_returns: VecDeque::new(),
            write_returns: VecDeque::new(),
            activate_window: VecDeque::with_capacity(4),
        }
    }

    /// Advances every bank's timed transitions by one cycle.
    pub fn step(&mut self) {
        for bank in &mut self.banks {
            bank.step();
        }
    }

    /// True if a new ACTIVATE would keep at most four activations inside
    /// any sliding tFAW window.
    pub fn activate_allowed(&self, now: u64, tfaw: u64) -> bool {
        match self.activate_window.front() {
            Some(&oldest) if self.activate_window.len() == 4 => oldest + tfaw <= now,
            _ => true,
        }
    }

    /// Records an ACTIVATE issue. Asserts the tFAW contract.
    pub fn record_activate(&mut self, now: u64, tfaw: u64) {
        assert!(
            self.activate_allowed(now, tfaw),
            "fifth ACTIVATE inside a tFAW window on rank {}",
            self.id
        );
        if self.activate_window.len() == 4 {
            self.activate_window.pop_front();
        }
        self.activate_window.push_back(now);
    }

    /// True if any bank currently holds a row open.
    pub fn any_bank_active(&self) -> bool {
        self.banks.iter().any(|b| b.phase == BankPhase::RowActive)
    }

    /// True if every bank is fully idle (no open row, no timed phase).
    pub fn all_banks_idle(&self) -> bool {
        self.banks.iter().all(|b| b.phase == BankPhase::Idle)
    }

    /// True once the whole rank can take a REFRESH this cycle.
    pub fn ready_for_refresh(&self, now: u64) -> bool {
        self.banks.iter().all(|b| b.ready_for_refresh(now))
    }

    /// True while no data is moving through the rank's pins.
    pub fn io_quiet(&self) -> bool {
        self.read_returns.is_empty() && self.write_returns.is_empty()
    }

    pub fn powered_down(&self) -> bool {
        matches!(self.power_state, PowerState::PoweredDown { .. })
    }
}
