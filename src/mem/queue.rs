//! Pending-command queues and the per-cycle selection scan.
//!
//! Commands wait in one FIFO per rank or one per (rank, bank), as
//! configured. Each cycle the scheduler asks for at most one command that
//! is both reachable under the reordering rules and legal under every
//! timing constraint. A command may be promoted past older entries only
//! when none of them targets its bank, which also preserves the causal
//! order of a single transaction's commands (they share a bank).

use crate::config::{Config, QueuingStructure, SchedulingPolicy};
use crate::mem::bank::BankPhase;
use crate::mem::command::{BusCommand, CommandKind};
use crate::mem::rank::Rank;
use std::collections::VecDeque;
use std::sync::Arc;

/// Command storage and selection for one channel.
#[derive(Debug)]
pub struct CommandQueue {
    cfg: Arc<Config>,
    /// Indexed `[rank][bank]` for per-bank queuing, `[rank][0]` otherwise.
    queues: Vec<Vec<VecDeque<BusCommand>>>,
    next_rank: usize,
    next_bank: usize,
}

impl CommandQueue {
    pub fn new(cfg: Arc<Config>) -> Self {
        let slots = match cfg.queuing_structure {
            QueuingStructure::PerRank => 1,
            QueuingStructure::PerBank => cfg.num_banks as usize,
        };
        let queues = (0..cfg.num_ranks)
            .map(|_| (0..slots).map(|_| VecDeque::new()).collect())
            .collect();
        Self {
            cfg,
            queues,
            next_rank: 0,
            next_bank: 0,
        }
    }

    fn per_bank(&self) -> bool {
        self.cfg.queuing_structure == QueuingStructure::PerBank
    }

    fn slot(&self, bank: usize) -> usize {
        if self.per_bank() {
            bank
        } else {
            0
        }
    }

    /// True if the queue holding commands for (rank, bank) can take `n`
    /// more entries.
    pub fn has_room_for(&self, n: usize, rank: usize, bank: usize) -> bool {
        self.queues[rank][self.slot(bank)].len() + n <= self.cfg.cmd_queue_depth
    }

    /// Appends a command. The caller must have checked for room.
    pub fn push(&mut self, cmd: BusCommand) {
        let slot = self.slot(cmd.bank);
        let queue = &mut self.queues[cmd.rank][slot];
        assert!(
            queue.len() < self.cfg.cmd_queue_depth,
            "command queue overflow on rank {} slot {}",
            cmd.rank,
            slot
        );
        queue.push_back(cmd);
    }

    /// True if no command is pending anywhere for `rank`.
    pub fn rank_empty(&self, rank: usize) -> bool {
        self.queues[rank].iter().all(|q| q.is_empty())
    }

    /// True if no command is pending on the whole channel.
    pub fn is_empty(&self) -> bool {
        (0..self.queues.len()).all(|r| self.rank_empty(r))
    }

    /// Commands currently queued against (rank, bank), oldest first.
    pub fn pending_for_bank<'a>(
        &'a self,
        rank: usize,
        bank: usize,
    ) -> impl Iterator<Item = &'a BusCommand> {
        self.queues[rank][self.slot(bank)]
            .iter()
            .filter(move |c| c.bank == bank)
    }

    /// True if a queued column access still targets the bank's open row,
    /// which forbids closing it.
    fn open_row_referenced(&self, rank: usize, bank: usize, open_row: u64) -> bool {
        self.pending_for_bank(rank, bank)
            .any(|c| c.kind.is_column() && c.row == open_row)
    }

    /// Selects at most one command that may be driven this cycle.
    pub fn pop(&mut self, now: u64, ranks: &[Rank]) -> Option<BusCommand> {
        // A pending refresh owns the rank until it issues.
        for rank in ranks {
            if rank.refresh_waiting && !rank.powered_down() {
                if let Some(cmd) = self.refresh_step(now, rank, ranks) {
                    return Some(cmd);
                }
            }
        }
        self.scheduled_pop(now, ranks)
    }

    /// Drives a refresh-pending rank toward REFRESH: drain column accesses
    /// to open rows, precharge rows nothing references, refresh once idle.
    fn refresh_step(&mut self, now: u64, rank: &Rank, ranks: &[Rank]) -> Option<BusCommand> {
        if rank.ready_for_refresh(now) {
            return Some(BusCommand::control(CommandKind::Refresh, rank.id, 0));
        }

        // Queued accesses to rows that are already open may still drain.
        for slot in 0..self.queues[rank.id].len() {
            if let Some(idx) = self.scan_slot(rank.id, slot, now, ranks, true) {
                return self.queues[rank.id][slot].remove(idx);
            }
        }

        // Close every open row that no queued access still needs.
        let closable: Vec<usize> = rank
            .banks
            .iter()
            .enumerate()
            .filter(|(b, bank)| {
                bank.phase == BankPhase::RowActive
                    && now >= bank.next_precharge
                    && !self.open_row_referenced(rank.id, *b, bank.open_row.unwrap())
            })
            .map(|(b, _)| b)
            .collect();
        let active = rank
            .banks
            .iter()
            .filter(|b| b.phase == BankPhase::RowActive)
            .count();
        if active > 1 && closable.len() == active {
            return Some(BusCommand::control(CommandKind::PrechargeAll, rank.id, 0));
        }
        closable
            .first()
            .map(|&b| BusCommand::control(CommandKind::Precharge, rank.id, b))
    }

    /// Round-robin scan across queues in the configured policy order.
    fn scheduled_pop(&mut self, now: u64, ranks: &[Rank]) -> Option<BusCommand> {
        let num_ranks = self.queues.len();
        let slots = self.queues[0].len();

        let mut order = Vec::with_capacity(num_ranks * slots);
        match self.cfg.scheduling_policy {
            SchedulingPolicy::RankThenBankRoundRobin => {
                for i in 0..num_ranks {
                    let r = (self.next_rank + i) % num_ranks;
                    for j in 0..slots {
                        order.push((r, (self.next_bank + j) % slots));
                    }
                }
            }
            SchedulingPolicy::BankThenRankRoundRobin => {
                for j in 0..slots {
                    let s = (self.next_bank + j) % slots;
                    for i in 0..num_ranks {
                        order.push(((self.next_rank + i) % num_ranks, s));
                    }
                }
            }
        }

        for (r, s) in order {
            if ranks[r].refresh_waiting || ranks[r].powered_down() {
                continue;
            }
            if let Some(idx) = self.scan_slot(r, s, now, ranks, false) {
                let cmd = self.queues[r][s].remove(idx).unwrap();
                match self.cfg.scheduling_policy {
                    // Stay on this rank until it runs dry.
                    SchedulingPolicy::RankThenBankRoundRobin => {
                        self.next_rank = r;
                        self.next_bank = (s + 1) % slots;
                    }
                    SchedulingPolicy::BankThenRankRoundRobin => {
                        self.next_bank = s;
                        self.next_rank = (r + 1) % num_ranks;
                    }
                }
                return Some(cmd);
            }
        }
        None
    }

    /// Finds the first selectable command in one queue.
    ///
    /// Walks from the head keeping a mask of banks owned by older entries;
    /// a command whose bank appears in the mask cannot be promoted. With
    /// `drain_only`, only column accesses against open rows qualify (the
    /// refresh drain). Precharges whose bank has already closed are elided
    /// in place.
    fn scan_slot(
        &mut self,
        rank: usize,
        slot: usize,
        now: u64,
        ranks: &[Rank],
        drain_only: bool,
    ) -> Option<usize> {
        let mut blocked: u64 = 0;
        let mut idx = 0;
        while idx < self.queues[rank][slot].len() {
            let cmd = self.queues[rank][slot][idx];
            let bank = &ranks[cmd.rank].banks[cmd.bank];

            // A precharge for a row something else already closed has
            // nothing left to do.
            if cmd.kind == CommandKind::Precharge
                && blocked & (1 << cmd.bank) == 0
                && bank.phase != BankPhase::RowActive
            {
                self.queues[rank][slot].remove(idx);
                continue;
            }

            if blocked & (1 << cmd.bank) == 0 {
                let eligible = if drain_only {
                    cmd.kind.is_column() && bank.open_row == Some(cmd.row)
                } else {
                    true
                };
                if eligible && is_issuable(&cmd, now, ranks, &self.cfg) {
                    return Some(idx);
                }
            }
            blocked |= 1 << cmd.bank;
            idx += 1;
            if self.per_bank() {
                // Same-bank commands may never pass each other, so only the
                // head of a per-bank queue is reachable.
                break;
            }
        }
        None
    }
}

/// Checks every timing and state constraint for driving `cmd` at `now`.
pub fn is_issuable(cmd: &BusCommand, now: u64, ranks: &[Rank], cfg: &Config) -> bool {
    let rank = &ranks[cmd.rank];
    let bank = &rank.banks[cmd.bank];
    if rank.powered_down() {
        return false;
    }
    match cmd.kind {
        CommandKind::Activate => {
            !rank.refresh_waiting
                && bank.phase == BankPhase::Idle
                && now >= bank.next_activate
                && rank.activate_allowed(now, cfg.tfaw)
        }
        CommandKind::Read | CommandKind::ReadAutoPrecharge => {
            bank.phase == BankPhase::RowActive
                && bank.open_row == Some(cmd.row)
                && now >= bank.next_read
        }
        CommandKind::Write | CommandKind::WriteAutoPrecharge => {
            bank.phase == BankPhase::RowActive
                && bank.open_row == Some(cmd.row)
                && now >= bank.next_write
        }
        CommandKind::Precharge => bank.phase == BankPhase::RowActive && now >= bank.next_precharge,
        CommandKind::PrechargeAll => rank.banks.iter().all(|b| {
            b.phase != BankPhase::RowActive || now >= b.next_precharge
        }),
        CommandKind::Refresh => rank.ready_for_refresh(now),
        CommandKind::PowerDownEnter | CommandKind::PowerDownExit => false,
    }
}
