//! Bank state machine.
//!
//! Each bank tracks its row buffer and the earliest cycle at which each
//! command kind becomes legal. The bank assumes its preconditions hold;
//! the scheduler is responsible for never driving a command early, and the
//! transition methods assert that contract.

use crate::config::Config;

/// Operating state of one bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankPhase {
    Idle,
    RowActive,
    Precharging,
    Refreshing,
    PowerDown,
}

/// State of a single DRAM bank.
///
/// Invariant: `open_row` is `Some` exactly when the phase is `RowActive`.
#[derive(Debug, Clone)]
pub struct BankState {
    pub phase: BankPhase,
    pub open_row: Option<u64>,
    /// Earliest cycle an ACTIVATE may be driven.
    pub next_activate: u64,
    /// Earliest cycle a column read may be driven.
    pub next_read: u64,
    /// Earliest cycle a column write may be driven.
    pub next_write: u64,
    /// Earliest cycle a PRECHARGE may be driven.
    pub next_precharge: u64,
    /// Cycle of the most recent ACTIVATE to this bank.
    pub last_activate: u64,
    /// Cycles left in a PRECHARGING or REFRESHING phase.
    countdown: u64,
}

impl Default for BankState {
    fn default() -> Self {
        Self {
            phase: BankPhase::Idle,
            open_row: None,
            next_activate: 0,
            next_read: 0,
            next_write: 0,
            next_precharge: 0,
            last_activate: 0,
            countdown: 0,
        }
    }
}

impl BankState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances timed phase transitions by one cycle. Called every cycle
    /// whether or not a command was issued.
    pub fn step(&mut self) {
        if self.countdown > 0 {
            self.countdown -= 1;
            if self.countdown == 0 {
                self.phase = BankPhase::Idle;
            }
        }
    }

    /// Opens `row`. Legal only from IDLE with `now >= next_activate`.
    pub fn activate(&mut self, now: u64, row: u64, cfg: &Config) {
        assert!(
            self.phase == BankPhase::Idle && now >= self.next_activate,
            "ACTIVATE driven while bank not ready (phase {:?}, next {})",
            self.phase,
            self.next_activate
        );
        self.phase = BankPhase::RowActive;
        self.open_row = Some(row);
        self.last_activate = now;
        let col_ready = now + cfg.trcd.saturating_sub(cfg.al);
        self.next_read = self.next_read.max(col_ready);
        self.next_write = self.next_write.max(col_ready);
        self.next_precharge = self.next_precharge.max(now + cfg.tras);
        self.next_activate = self.next_activate.max(now + cfg.trc);
    }

    /// Applies the own-bank effects of a column read. With `auto_precharge`
    /// the row closes logically at issue and the activate gate absorbs the
    /// implicit precharge time.
    pub fn column_read(&mut self, now: u64, row: u64, auto_precharge: bool, cfg: &Config) {
        assert!(
            self.phase == BankPhase::RowActive
                && self.open_row == Some(row)
                && now >= self.next_read,
            "READ driven against row 0x{:x} not open (open {:?}, next {})",
            row,
            self.open_row,
            self.next_read
        );
        if auto_precharge {
            self.phase = BankPhase::Idle;
            self.open_row = None;
            self.next_activate = self
                .next_activate
                .max(now + cfg.al + cfg.trtp + cfg.trp);
        } else {
            self.next_precharge = self.next_precharge.max(now + cfg.read_to_pre_delay());
        }
    }

    /// Applies the own-bank effects of a column write.
    pub fn column_write(&mut self, now: u64, row: u64, auto_precharge: bool, cfg: &Config) {
        assert!(
            self.phase == BankPhase::RowActive
                && self.open_row == Some(row)
                && now >= self.next_write,
            "WRITE driven against row 0x{:x} not open (open {:?}, next {})",
            row,
            self.open_row,
            self.next_write
        );
        if auto_precharge {
            self.phase = BankPhase::Idle;
            self.open_row = None;
            self.next_activate = self
                .next_activate
                .max(now + cfg.write_to_pre_delay() + cfg.trp);
        } else {
            self.next_precharge = self.next_precharge.max(now + cfg.write_to_pre_delay());
        }
    }

    /// Closes the open row. The bank reads as PRECHARGING for tRP cycles.
    pub fn precharge(&mut self, now: u64, cfg: &Config) {
        assert!(
            self.phase == BankPhase::RowActive && now >= self.next_precharge,
            "PRECHARGE driven while bank not ready (phase {:?}, next {})",
            self.phase,
            self.next_precharge
        );
        self.phase = BankPhase::Precharging;
        self.open_row = None;
        self.countdown = cfg.trp;
        self.next_activate = self.next_activate.max(now + cfg.trp);
    }

    /// Rank-wide refresh as seen by this bank: blocked for tRFC.
    pub fn refresh(&mut self, now: u64, cfg: &Config) {
        assert!(
            self.phase == BankPhase::Idle && now >= self.next_activate,
            "REFRESH driven while bank busy (phase {:?}, next {})",
            self.phase,
            self.next_activate
        );
        self.phase = BankPhase::Refreshing;
        self.countdown = cfg.trfc;
        self.next_activate = now + cfg.trfc;
    }

    /// Enters the power-down phase. Only an idle bank can be powered down.
    pub fn power_down(&mut self) {
        assert!(
            self.phase == BankPhase::Idle,
            "power-down of a non-idle bank (phase {:?})",
            self.phase
        );
        self.phase = BankPhase::PowerDown;
    }

    /// Leaves power-down; commands are legal tXP later.
    pub fn power_up(&mut self, now: u64, cfg: &Config) {
        assert!(self.phase == BankPhase::PowerDown);
        self.phase = BankPhase::Idle;
        self.next_activate = self.next_activate.max(now + cfg.txp);
    }

    /// True once the bank is idle with its activate gate open.
    pub fn ready_for_refresh(&self, now: u64) -> bool {
        self.phase == BankPhase::Idle && now >= self.next_activate
    }
}
