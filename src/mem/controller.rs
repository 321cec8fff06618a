//! The per-channel memory controller.
//!
//! Owns the transaction queue, the command queue, and the channel's ranks.
//! Each DRAM cycle it advances bank timers, flags due refreshes, drains at
//! most one transaction into bus commands, drives at most one command onto
//! the shared command bus, models data-bus occupancy, and returns
//! completions whose final data beat has crossed the pins.

use crate::config::{Config, RowBufferPolicy};
use crate::mem::addressing::{AddressMapper, MappedAddress};
use crate::mem::bank::BankPhase;
use crate::mem::command::{BusCommand, CommandKind};
use crate::mem::queue::CommandQueue;
use crate::mem::rank::{PendingData, PowerState, Rank};
use crate::mem::transaction::{Completion, Transaction, TransactionKind};
use crate::stats::{BackgroundClass, ChannelStats};
use std::collections::VecDeque;
use std::sync::Arc;

/// Completion delivery closure; monomorphic per channel.
pub type CompletionCallback = Box<dyn FnMut(Completion)>;

/// Observer invoked for every issued bus command with its cycle and
/// channel. Feeds the verification dump and tests.
pub type CommandHook = Box<dyn FnMut(u64, usize, &BusCommand)>;

/// Memory controller for one channel.
pub struct MemoryController {
    cfg: Arc<Config>,
    channel: usize,
    mapper: AddressMapper,
    ranks: Vec<Rank>,
    queue: CommandQueue,
    transaction_queue: VecDeque<Transaction>,
    /// Accepted transactions whose data has not fully moved yet.
    in_flight: Vec<Transaction>,
    /// Completions awaiting `drain_completions` when no callback is set.
    completions: VecDeque<Completion>,
    read_callback: Option<CompletionCallback>,
    write_callback: Option<CompletionCallback>,
    command_hook: Option<CommandHook>,
    pub stats: ChannelStats,
    cycle: u64,
    next_seq: u64,
    data_bus_busy_until: u64,
}

impl MemoryController {
    pub fn new(channel: usize, cfg: Arc<Config>) -> Self {
        assert!(
            cfg.num_banks <= 64,
            "bank-block masks cap the controller at 64 banks per rank"
        );
        let ranks = (0..cfg.num_ranks as usize)
            .map(|id| Rank::new(id, &cfg))
            .collect();
        Self {
            mapper: AddressMapper::new(&cfg),
            queue: CommandQueue::new(cfg.clone()),
            stats: ChannelStats::new(cfg.num_ranks as usize),
            cfg,
            channel,
            ranks,
            transaction_queue: VecDeque::new(),
            in_flight: Vec::new(),
            completions: VecDeque::new(),
            read_callback: None,
            write_callback: None,
            command_hook: None,
            cycle: 0,
            next_seq: 0,
            data_bus_busy_until: 0,
        }
    }

    /// True iff the transaction queue has space for one more entry.
    pub fn will_accept(&self) -> bool {
        self.transaction_queue.len() < self.cfg.trans_queue_depth
    }

    /// Takes ownership of a transaction, aligning its address and stamping
    /// id and arrival cycle. On rejection the transaction is handed back
    /// untouched and no state changes.
    pub fn enqueue(&mut self, mut txn: Transaction) -> Result<(), Transaction> {
        if !self.will_accept() {
            return Err(txn);
        }
        txn.address = self.mapper.align(txn.address);
        self.next_seq += 1;
        txn.id = ((self.channel as u64) << 48) | self.next_seq;
        txn.arrival_cycle = self.cycle;
        if !self.cfg.store_data {
            txn.data = None;
        }
        self.stats.on_accept(txn.kind);
        self.transaction_queue.push_back(txn);
        Ok(())
    }

    /// Installs the completion closures.
    pub fn register_callbacks(
        &mut self,
        on_read_complete: CompletionCallback,
        on_write_complete: CompletionCallback,
    ) {
        self.read_callback = Some(on_read_complete);
        self.write_callback = Some(on_write_complete);
    }

    /// Installs an observer for every issued bus command.
    pub fn set_command_hook(&mut self, hook: CommandHook) {
        self.command_hook = Some(hook);
    }

    /// Completions buffered since the last drain (callback-less operation).
    pub fn drain_completions(&mut self) -> Vec<Completion> {
        self.completions.drain(..).collect()
    }

    /// The next cycle `tick` will simulate.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    /// True when nothing is queued, in flight, or awaiting drain.
    pub fn is_idle(&self) -> bool {
        self.transaction_queue.is_empty() && self.in_flight.is_empty() && self.queue.is_empty()
    }

    /// Advances one DRAM cycle.
    pub fn tick(&mut self) {
        let now = self.cycle;

        for rank in &mut self.ranks {
            rank.step();
        }

        // Refresh deadlines are mandatory; the flag stays up until the
        // REFRESH actually issues.
        for rank in &mut self.ranks {
            if now >= rank.next_refresh {
                rank.refresh_waiting = true;
                rank.next_refresh += self.cfg.t_refi;
            }
        }

        self.drain_one_transaction();

        if let Some(cmd) = self.select_command(now) {
            self.issue(cmd, now);
        } else {
            self.stats.nop_cycles += 1;
        }

        self.collect_returns(now);

        for rank in &self.ranks {
            let class = if rank.powered_down() {
                BackgroundClass::PowerDown
            } else if rank.any_bank_active() {
                BackgroundClass::ActiveStandby
            } else {
                BackgroundClass::PrechargeStandby
            };
            self.stats.background_tick(rank.id, class, &self.cfg);
        }

        self.cycle = now + 1;
    }

    /// Moves the oldest drainable transaction into the command queue.
    ///
    /// A transaction is drainable when its rank is not waiting on a
    /// refresh and the destination queue has room for its full command
    /// sequence. Scanning past a blocked head cannot reorder same-address
    /// transactions because those share a destination queue.
    fn drain_one_transaction(&mut self) {
        for i in 0..self.transaction_queue.len() {
            let map = self.mapper.decompose(self.transaction_queue[i].address);
            debug_assert_eq!(map.channel as usize, self.channel);
            let (r, b) = (map.rank as usize, map.bank as usize);
            if self.ranks[r].refresh_waiting {
                continue;
            }
            let plan = self.decomposition_plan(&map, self.transaction_queue[i].kind);
            if !self.queue.has_room_for(plan.len(), r, b) {
                continue;
            }

            let txn = self.transaction_queue.remove(i).unwrap();
            if plan.len() == 1 {
                self.stats.on_row_hit();
            } else {
                self.stats.on_row_miss();
            }
            for kind in plan {
                self.queue.push(BusCommand {
                    kind,
                    rank: r,
                    bank: b,
                    row: map.row,
                    column: map.column,
                    transaction_id: txn.id,
                    address: txn.address,
                });
            }
            self.in_flight.push(txn);
            return;
        }
    }

    /// The command sequence a transaction needs, given the row the bank
    /// will expose once everything already queued for it has drained.
    fn decomposition_plan(&self, map: &MappedAddress, kind: TransactionKind) -> Vec<CommandKind> {
        let col = match (self.cfg.row_buffer_policy, kind) {
            (RowBufferPolicy::ClosedPage, TransactionKind::Read) => CommandKind::ReadAutoPrecharge,
            (RowBufferPolicy::ClosedPage, TransactionKind::Write) => {
                CommandKind::WriteAutoPrecharge
            }
            (RowBufferPolicy::OpenPage, TransactionKind::Read) => CommandKind::Read,
            (RowBufferPolicy::OpenPage, TransactionKind::Write) => CommandKind::Write,
        };
        if self.cfg.row_buffer_policy == RowBufferPolicy::ClosedPage {
            return vec![CommandKind::Activate, col];
        }
        match self.final_row(map.rank as usize, map.bank as usize) {
            Some(row) if row == map.row => vec![col],
            Some(_) => vec![CommandKind::Precharge, CommandKind::Activate, col],
            None => vec![CommandKind::Activate, col],
        }
    }

    /// The row the bank will have open after its queued commands drain.
    fn final_row(&self, rank: usize, bank: usize) -> Option<u64> {
        let state = &self.ranks[rank].banks[bank];
        let mut row = match state.phase {
            BankPhase::RowActive => state.open_row,
            _ => None,
        };
        for cmd in self.queue.pending_for_bank(rank, bank) {
            match cmd.kind {
                CommandKind::Activate => row = Some(cmd.row),
                CommandKind::Precharge
                | CommandKind::ReadAutoPrecharge
                | CommandKind::WriteAutoPrecharge => row = None,
                _ => {}
            }
        }
        row
    }

    /// Picks this cycle's command: a pending power-up beats the queues,
    /// and power-down is only considered when nothing else wants the bus.
    fn select_command(&mut self, now: u64) -> Option<BusCommand> {
        if let Some(cmd) = self.power_exit_command(now) {
            return Some(cmd);
        }
        if let Some(cmd) = self.queue.pop(now, &self.ranks) {
            return Some(cmd);
        }
        self.power_enter_command()
    }

    fn power_exit_command(&self, now: u64) -> Option<BusCommand> {
        for rank in &self.ranks {
            if let PowerState::PoweredDown { since } = rank.power_state {
                let wanted = rank.refresh_waiting || !self.queue.rank_empty(rank.id);
                if wanted && now >= since + self.cfg.tcke {
                    return Some(BusCommand::control(CommandKind::PowerDownExit, rank.id, 0));
                }
            }
        }
        None
    }

    fn power_enter_command(&self) -> Option<BusCommand> {
        if !self.cfg.use_low_power {
            return None;
        }
        for rank in &self.ranks {
            if !rank.powered_down()
                && !rank.refresh_waiting
                && rank.all_banks_idle()
                && rank.io_quiet()
                && self.queue.rank_empty(rank.id)
            {
                return Some(BusCommand::control(CommandKind::PowerDownEnter, rank.id, 0));
            }
        }
        None
    }

    /// Drives one command: updates the target bank, propagates cross-bank
    /// and cross-rank timing, reserves the data bus, and books energy.
    fn issue(&mut self, cmd: BusCommand, now: u64) {
        if let Some(hook) = &mut self.command_hook {
            hook(now, self.channel, &cmd);
        }
        self.stats.commands_issued += 1;

        match cmd.kind {
            CommandKind::Activate => {
                self.stats.activates += 1;
                self.stats.on_activate_energy(cmd.rank, &self.cfg);
                let cfg = self.cfg.clone();
                let rank = &mut self.ranks[cmd.rank];
                rank.banks[cmd.bank].activate(now, cmd.row, &cfg);
                rank.record_activate(now, cfg.tfaw);
                for (b, bank) in rank.banks.iter_mut().enumerate() {
                    if b != cmd.bank {
                        bank.next_activate = bank.next_activate.max(now + cfg.trrd);
                    }
                }
            }
            CommandKind::Read | CommandKind::ReadAutoPrecharge => {
                self.issue_column(cmd, now, true);
            }
            CommandKind::Write | CommandKind::WriteAutoPrecharge => {
                self.issue_column(cmd, now, false);
            }
            CommandKind::Precharge => {
                self.stats.precharges += 1;
                let cfg = self.cfg.clone();
                self.ranks[cmd.rank].banks[cmd.bank].precharge(now, &cfg);
            }
            CommandKind::PrechargeAll => {
                let cfg = self.cfg.clone();
                for bank in &mut self.ranks[cmd.rank].banks {
                    if bank.phase == BankPhase::RowActive {
                        self.stats.precharges += 1;
                        bank.precharge(now, &cfg);
                    }
                }
            }
            CommandKind::Refresh => {
                self.stats.refreshes += 1;
                self.stats.on_refresh_energy(cmd.rank, &self.cfg);
                let cfg = self.cfg.clone();
                let rank = &mut self.ranks[cmd.rank];
                assert!(rank.refresh_waiting, "REFRESH issued with no deadline");
                rank.refresh_waiting = false;
                for bank in &mut rank.banks {
                    bank.refresh(now, &cfg);
                }
            }
            CommandKind::PowerDownEnter => {
                let rank = &mut self.ranks[cmd.rank];
                for bank in &mut rank.banks {
                    bank.power_down();
                }
                rank.power_state = PowerState::PoweredDown { since: now };
            }
            CommandKind::PowerDownExit => {
                let cfg = self.cfg.clone();
                let rank = &mut self.ranks[cmd.rank];
                for bank in &mut rank.banks {
                    bank.power_up(now, &cfg);
                }
                rank.power_state = PowerState::Active;
            }
        }
    }

    fn issue_column(&mut self, cmd: BusCommand, now: u64, is_read: bool) {
        let cfg = self.cfg.clone();
        let auto = matches!(
            cmd.kind,
            CommandKind::ReadAutoPrecharge | CommandKind::WriteAutoPrecharge
        );
        let burst = cfg.burst_cycles;

        // Column-to-column spacing per JEDEC: tCCD within the rank, bus
        // turnaround plus tRTRS across ranks, tWTR behind a write.
        let (start, same_read, same_write, other_read, other_write) = if is_read {
            let turnaround =
                now + (cfg.read_latency + burst + cfg.trtrs).saturating_sub(cfg.write_latency);
            (
                now + cfg.read_latency,
                now + cfg.tccd.max(burst),
                turnaround,
                now + burst + cfg.trtrs,
                turnaround,
            )
        } else {
            (
                now + cfg.write_latency,
                now + cfg.write_latency + burst + cfg.twtr,
                now + cfg.tccd.max(burst),
                now + (cfg.write_latency + burst + cfg.trtrs).saturating_sub(cfg.read_latency),
                now + burst + cfg.trtrs,
            )
        };

        {
            let bank = &mut self.ranks[cmd.rank].banks[cmd.bank];
            if is_read {
                bank.column_read(now, cmd.row, auto, &cfg);
            } else {
                bank.column_write(now, cmd.row, auto, &cfg);
            }
        }

        for (r, rank) in self.ranks.iter_mut().enumerate() {
            for bank in &mut rank.banks {
                if r == cmd.rank {
                    bank.next_read = bank.next_read.max(same_read);
                    bank.next_write = bank.next_write.max(same_write);
                } else {
                    bank.next_read = bank.next_read.max(other_read);
                    bank.next_write = bank.next_write.max(other_write);
                }
            }
        }

        assert!(
            start >= self.data_bus_busy_until,
            "data bus burst overlap at cycle {}",
            now
        );
        self.data_bus_busy_until = start + burst;
        self.stats.data_bus_busy += burst;
        self.stats.epoch_bus_busy += burst;
        self.stats.on_burst_energy(cmd.rank, is_read, &cfg);

        let pending = PendingData {
            transaction_id: cmd.transaction_id,
            ready_cycle: start + burst,
        };
        if is_read {
            self.ranks[cmd.rank].read_returns.push_back(pending);
        } else {
            self.ranks[cmd.rank].write_returns.push_back(pending);
        }
    }

    /// Emits completions for every burst whose final beat has crossed the
    /// pins by `now`.
    fn collect_returns(&mut self, now: u64) {
        for r in 0..self.ranks.len() {
            while let Some(front) = self.ranks[r].read_returns.front().copied() {
                if front.ready_cycle > now {
                    break;
                }
                self.ranks[r].read_returns.pop_front();
                self.complete(front);
            }
            while let Some(front) = self.ranks[r].write_returns.front().copied() {
                if front.ready_cycle > now {
                    break;
                }
                self.ranks[r].write_returns.pop_front();
                self.complete(front);
            }
        }
    }

    fn complete(&mut self, pending: PendingData) {
        let idx = self
            .in_flight
            .iter()
            .position(|t| t.id == pending.transaction_id)
            .expect("data returned for a transaction not in flight");
        let mut txn = self.in_flight.swap_remove(idx);
        let latency = pending.ready_cycle - txn.arrival_cycle;
        self.stats
            .on_complete(txn.kind, latency, self.cfg.histogram_bin_size);

        let completion = Completion {
            transaction_id: txn.id,
            address: txn.address,
            done_cycle: pending.ready_cycle,
            kind: txn.kind,
            data: txn.data.take(),
        };
        let callback = match txn.kind {
            TransactionKind::Read => &mut self.read_callback,
            TransactionKind::Write => &mut self.write_callback,
        };
        match callback {
            Some(cb) => cb(completion),
            None => self.completions.push_back(completion),
        }
    }
}
