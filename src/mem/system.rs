//! Multi-channel front end.
//!
//! Routes transactions to channels by address mapping, fans `update()`
//! across every channel behind the clock-domain crosser, owns the output
//! files, and aggregates statistics at epoch boundaries and at the end of
//! the run.

use crate::clock::ClockDomainCrosser;
use crate::config::ini::{self, OptionsMap};
use crate::config::{Config, ConfigError};
use crate::mem::addressing::AddressMapper;
use crate::mem::channel::Channel;
use crate::mem::controller::CompletionCallback;
use crate::mem::transaction::{Completion, Transaction};
use crate::output::{self, CommandLog, SimLog, VisWriter};
use crate::stats::StatSink;
use crate::stats::PowerReport;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Per-rank power report closure, invoked at each epoch boundary.
pub type PowerCallback = Box<dyn FnMut(PowerReport)>;

/// The whole memory system as the client sees it.
pub struct MemorySystem {
    cfg: Arc<Config>,
    mapper: AddressMapper,
    channels: Vec<Channel>,
    crosser: ClockDomainCrosser,
    /// DRAM cycles simulated so far.
    cycle: u64,
    read_callback: Option<CompletionCallback>,
    write_callback: Option<CompletionCallback>,
    power_callback: Option<PowerCallback>,
    completions: Vec<Completion>,
    vis: Option<VisWriter>,
    log: Option<SimLog>,
    quiet: bool,
}

impl MemorySystem {
    /// Builds a system from the two INI files, the working directory, and
    /// the command-line overrides. Creates the configured output files.
    ///
    /// Relative INI paths are taken under `pwd` when it is nonempty, the
    /// same way the driver resolves its trace path.
    pub fn new(
        device_ini: &str,
        system_ini: &str,
        pwd: &str,
        trace_name: &str,
        megs_of_memory: u64,
        overrides: &OptionsMap,
        vis_file: Option<&str>,
        quiet: bool,
    ) -> Result<Self, ConfigError> {
        let device_path = resolve_under_pwd(pwd, device_ini);
        let system_path = resolve_under_pwd(pwd, system_ini);
        let cfg = ini::load_config(
            &device_path,
            &system_path,
            overrides,
            megs_of_memory,
            quiet,
        )?;

        let mut system = Self::with_config(cfg);
        system.quiet = quiet;

        if system.cfg.vis_file_output {
            let path = match vis_file {
                Some(name) => PathBuf::from(name),
                None => output::vis_file_path(pwd, trace_name, &device_path, &system.cfg)
                    .map_err(|e| ConfigError::Io {
                        path: "results directory".to_string(),
                        message: e.to_string(),
                    })?,
            };
            let vis = VisWriter::create(&path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            if !quiet {
                println!("[MemorySystem] vis output: {}", path.display());
            }
            system.vis = Some(vis);
        }

        if system.cfg.verification_output {
            let log = CommandLog::create_for_device(&device_path).map_err(|e| ConfigError::Io {
                path: "verification dump".to_string(),
                message: e.to_string(),
            })?;
            let shared = Arc::new(Mutex::new(log));
            for channel in &mut system.channels {
                let sink = shared.clone();
                channel.set_command_hook(Box::new(move |cycle, chan, cmd| {
                    sink.lock().unwrap().log(cycle, chan, cmd);
                }));
            }
        }

        if system.cfg.log_output {
            let mut log = SimLog::create().map_err(|e| ConfigError::Io {
                path: "run log".to_string(),
                message: e.to_string(),
            })?;
            log.line(&format!(
                "{} MB, {} channels x {} ranks x {} banks, {} x {}",
                system.cfg.megs_of_memory,
                system.cfg.num_chans,
                system.cfg.num_ranks,
                system.cfg.num_banks,
                system.cfg.num_rows,
                system.cfg.num_cols
            ));
            system.log = Some(log);
        }

        Ok(system)
    }

    /// Builds a system around an already-resolved configuration, with no
    /// output files. This is the embedding and test entry point.
    pub fn with_config(cfg: Config) -> Self {
        let cfg = Arc::new(cfg);
        let channels = (0..cfg.num_chans as usize)
            .map(|id| Channel::new(id, cfg.clone()))
            .collect();
        let dram_hz = cfg.dram_clk_hz();
        Self {
            mapper: AddressMapper::new(&cfg),
            channels,
            crosser: ClockDomainCrosser::new(dram_hz, 0),
            cfg,
            cycle: 0,
            read_callback: None,
            write_callback: None,
            power_callback: None,
            completions: Vec::new(),
            vis: None,
            log: None,
            quiet: true,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// DRAM cycles simulated so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Channel] {
        &mut self.channels
    }

    /// Sets the host clock. Zero means the host runs at the DRAM clock.
    pub fn set_cpu_clock_speed(&mut self, host_hz: u64) {
        self.crosser = ClockDomainCrosser::new(self.cfg.dram_clk_hz(), host_hz);
    }

    /// Registers the completion closures and the optional power report.
    pub fn register_callbacks(
        &mut self,
        on_read_complete: CompletionCallback,
        on_write_complete: CompletionCallback,
        on_power_report: Option<PowerCallback>,
    ) {
        self.read_callback = Some(on_read_complete);
        self.write_callback = Some(on_write_complete);
        self.power_callback = on_power_report;
    }

    /// True iff the channel this address maps to has queue space.
    pub fn will_accept_transaction_for(&self, address: u64) -> bool {
        let chan = self.mapper.channel_of(address) as usize;
        self.channels[chan].will_accept()
    }

    /// Without an address the worst case must be assumed: accept only when
    /// every channel has room.
    pub fn will_accept_transaction(&self) -> bool {
        self.channels.iter().all(|c| c.will_accept())
    }

    /// Routes a transaction to its channel. On rejection the transaction
    /// comes back to the caller, which retries on a later cycle.
    pub fn add_transaction(&mut self, txn: Transaction) -> Result<(), Transaction> {
        let chan = self.mapper.channel_of(txn.address) as usize;
        self.channels[chan].add_transaction(txn)
    }

    /// Registers one host-clock tick, advancing the DRAM clock as many
    /// cycles as the frequency ratio owes.
    pub fn update(&mut self) {
        let ticks = self.crosser.advance();
        for _ in 0..ticks {
            self.actual_update();
        }
    }

    fn actual_update(&mut self) {
        for channel in &mut self.channels {
            channel.update();
        }

        for idx in 0..self.channels.len() {
            for completion in self.channels[idx].drain_completions() {
                self.deliver(completion);
            }
        }

        self.cycle += 1;
        if self.cycle % self.cfg.epoch_length == 0 {
            self.dump_epoch(self.cfg.epoch_length);
        }
    }

    fn deliver(&mut self, completion: Completion) {
        use crate::mem::transaction::TransactionKind;
        let callback = match completion.kind {
            TransactionKind::Read => &mut self.read_callback,
            TransactionKind::Write => &mut self.write_callback,
        };
        match callback {
            Some(cb) => cb(completion),
            None => self.completions.push(completion),
        }
    }

    /// Completions accumulated while no callbacks were registered.
    pub fn drain_completions(&mut self) -> Vec<Completion> {
        std::mem::take(&mut self.completions)
    }

    fn dump_epoch(&mut self, epoch_cycles: u64) {
        for channel in &self.channels {
            let stats = &channel.controller().stats;
            if let Some(vis) = &mut self.vis {
                stats.record_epoch(channel.id, epoch_cycles, &self.cfg, vis);
            }
            if let Some(cb) = &mut self.power_callback {
                for report in stats.power_reports(channel.id, epoch_cycles, &self.cfg) {
                    cb(report);
                }
            }
            if !self.quiet {
                println!(
                    "[Epoch] cycle {} ch{}: {} reads, {} writes, {:.3} GB/s, {:.1} ns avg",
                    self.cycle,
                    channel.id,
                    stats.epoch_reads,
                    stats.epoch_writes,
                    stats.epoch_bandwidth_gbps(epoch_cycles, &self.cfg),
                    stats.epoch_latency_ns(&self.cfg)
                );
            }
        }
        if let Some(vis) = &mut self.vis {
            vis.end_row();
            vis.flush();
        }
        for channel in &mut self.channels {
            channel.controller_mut().stats.reset_epoch();
        }
    }

    /// Prints the per-channel lifetime summaries.
    pub fn print_stats(&self) {
        for channel in &self.channels {
            println!("==== Channel [{}] ====", channel.id);
            channel
                .controller()
                .stats
                .print_summary(self.cycle, &self.cfg);
            println!("//// Channel [{}] ////", channel.id);
        }
    }

    /// Final bookkeeping: flush the partial epoch and print the summary.
    pub fn simulation_done(&mut self) {
        let partial = self.cycle % self.cfg.epoch_length;
        if partial > 0 {
            self.dump_epoch(partial);
        }
        if let Some(log) = &mut self.log {
            log.line(&format!("simulation finished at cycle {}", self.cycle));
            log.flush();
        }
        self.print_stats();
    }

    /// Geometry tuple: (channels, ranks, banks, rows, columns).
    pub fn dimensions(&self) -> (u64, u64, u64, u64, u64) {
        (
            self.cfg.num_chans,
            self.cfg.num_ranks,
            self.cfg.num_banks,
            self.cfg.num_rows,
            self.cfg.num_cols,
        )
    }
}

fn resolve_under_pwd(pwd: &str, path: &str) -> PathBuf {
    if pwd.is_empty() || path.starts_with('/') {
        PathBuf::from(path)
    } else {
        Path::new(pwd).join(path)
    }
}
