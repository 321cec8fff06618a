//! Simulation statistics and the rank power model.
//!
//! Each channel keeps a flat counter block plus a latency histogram and
//! per-rank energy accumulators. Counters come in lifetime and epoch
//! flavors; the epoch side resets after every dump so the vis output shows
//! per-epoch behavior rather than running totals.

use crate::config::Config;
use crate::mem::transaction::TransactionKind;
use std::collections::BTreeMap;

/// Destination for named statistics, one value at a time. `end_row` closes
/// one epoch's worth of values.
pub trait StatSink {
    fn record(&mut self, name: &str, value: f64);
    fn end_row(&mut self);
}

/// What the rank spent the cycle doing, for background-current accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundClass {
    /// At least one bank has a row open.
    ActiveStandby,
    /// All banks closed, clocks running.
    PrechargeStandby,
    /// CKE low.
    PowerDown,
}

/// Per-rank energy accumulators in milliamp-cycles, epoch scoped.
#[derive(Debug, Default, Clone)]
pub struct RankEnergy {
    pub background: u64,
    pub actpre: u64,
    pub burst: u64,
    pub refresh: u64,
}

/// One rank's average power over an epoch, in watts.
#[derive(Debug, Clone)]
pub struct PowerReport {
    pub channel: usize,
    pub rank: usize,
    pub background_w: f64,
    pub burst_w: f64,
    pub refresh_w: f64,
    pub actpre_w: f64,
}

impl PowerReport {
    pub fn total_w(&self) -> f64 {
        self.background_w + self.burst_w + self.refresh_w + self.actpre_w
    }
}

/// Counter block for one channel.
#[derive(Debug)]
pub struct ChannelStats {
    pub reads_accepted: u64,
    pub writes_accepted: u64,
    pub reads_completed: u64,
    pub writes_completed: u64,
    pub row_hits: u64,
    pub row_misses: u64,
    pub activates: u64,
    pub precharges: u64,
    pub refreshes: u64,
    pub commands_issued: u64,
    pub nop_cycles: u64,
    pub data_bus_busy: u64,
    pub total_latency: u64,
    /// Completion latency counts, keyed by bin floor in cycles.
    pub latency_histogram: BTreeMap<u64, u64>,

    pub epoch_reads: u64,
    pub epoch_writes: u64,
    pub epoch_latency: u64,
    pub epoch_bus_busy: u64,
    rank_energy: Vec<RankEnergy>,
}

impl ChannelStats {
    pub fn new(num_ranks: usize) -> Self {
        Self {
            reads_accepted: 0,
            writes_accepted: 0,
            reads_completed: 0,
            writes_completed: 0,
            row_hits: 0,
            row_misses: 0,
            activates: 0,
            precharges: 0,
            refreshes: 0,
            commands_issued: 0,
            nop_cycles: 0,
            data_bus_busy: 0,
            total_latency: 0,
            latency_histogram: BTreeMap::new(),
            epoch_reads: 0,
            epoch_writes: 0,
            epoch_latency: 0,
            epoch_bus_busy: 0,
            rank_energy: vec![RankEnergy::default(); num_ranks],
        }
    }

    pub fn on_accept(&mut self, kind: TransactionKind) {
        match kind {
            TransactionKind::Read => self.reads_accepted += 1,
            TransactionKind::Write => self.writes_accepted += 1,
        }
    }

    pub fn on_row_hit(&mut self) {
        self.row_hits += 1;
    }

    pub fn on_row_miss(&mut self) {
        self.row_misses += 1;
    }

    pub fn on_complete(&mut self, kind: TransactionKind, latency: u64, bin_size: u64) {
        match kind {
            TransactionKind::Read => {
                self.reads_completed += 1;
                self.epoch_reads += 1;
            }
            TransactionKind::Write => {
                self.writes_completed += 1;
                self.epoch_writes += 1;
            }
        }
        self.total_latency += latency;
        self.epoch_latency += latency;
        let bin = (latency / bin_size) * bin_size;
        *self.latency_histogram.entry(bin).or_insert(0) += 1;
    }

    /// Accrues one cycle of background current for a rank.
    pub fn background_tick(&mut self, rank: usize, class: BackgroundClass, cfg: &Config) {
        let draw = match class {
            BackgroundClass::ActiveStandby => cfg.idd3n,
            BackgroundClass::PrechargeStandby => cfg.idd2n,
            BackgroundClass::PowerDown => cfg.idd2p,
        };
        self.rank_energy[rank].background += draw;
    }

    /// Accrues the activate/precharge pair energy for one ACTIVATE.
    pub fn on_activate_energy(&mut self, rank: usize, cfg: &Config) {
        let gross = cfg.idd0 * cfg.trc;
        let standby = cfg.idd3n * cfg.tras + cfg.idd2n * cfg.trc.saturating_sub(cfg.tras);
        self.rank_energy[rank].actpre += gross.saturating_sub(standby);
    }

    /// Accrues burst energy for one column access.
    pub fn on_burst_energy(&mut self, rank: usize, is_read: bool, cfg: &Config) {
        let draw = if is_read { cfg.idd4r } else { cfg.idd4w };
        self.rank_energy[rank].burst += draw.saturating_sub(cfg.idd3n) * cfg.burst_cycles;
    }

    /// Accrues refresh energy for one REFRESH.
    pub fn on_refresh_energy(&mut self, rank: usize, cfg: &Config) {
        self.rank_energy[rank].refresh += cfg.idd5.saturating_sub(cfg.idd3n) * cfg.trfc;
    }

    /// Converts the epoch's energy into average watts per rank.
    pub fn power_reports(&self, channel: usize, cycles: u64, cfg: &Config) -> Vec<PowerReport> {
        let cycles = cycles.max(1) as f64;
        let scale = cfg.devices_per_rank as f64 * cfg.vdd / cycles / 1000.0;
        self.rank_energy
            .iter()
            .enumerate()
            .map(|(rank, e)| PowerReport {
                channel,
                rank,
                background_w: e.background as f64 * scale,
                burst_w: e.burst as f64 * scale,
                refresh_w: e.refresh as f64 * scale,
                actpre_w: e.actpre as f64 * scale,
            })
            .collect()
    }

    /// Average epoch latency in nanoseconds.
    pub fn epoch_latency_ns(&self, cfg: &Config) -> f64 {
        let done = self.epoch_reads + self.epoch_writes;
        if done == 0 {
            return 0.0;
        }
        self.epoch_latency as f64 / done as f64 * cfg.tck
    }

    /// Epoch bandwidth in gigabytes per second.
    pub fn epoch_bandwidth_gbps(&self, cycles: u64, cfg: &Config) -> f64 {
        if cycles == 0 {
            return 0.0;
        }
        let bytes = (self.epoch_reads + self.epoch_writes) * cfg.transaction_bytes;
        let seconds = cycles as f64 * cfg.tck * 1e-9;
        bytes as f64 / seconds / 1e9
    }

    /// Writes this channel's epoch columns into the sink.
    pub fn record_epoch(&self, channel: usize, cycles: u64, cfg: &Config, sink: &mut dyn StatSink) {
        let ch = format!("ch{}", channel);
        sink.record(&format!("{}_reads", ch), self.epoch_reads as f64);
        sink.record(&format!("{}_writes", ch), self.epoch_writes as f64);
        sink.record(
            &format!("{}_bandwidth_gbps", ch),
            self.epoch_bandwidth_gbps(cycles, cfg),
        );
        sink.record(&format!("{}_latency_ns", ch), self.epoch_latency_ns(cfg));
        sink.record(
            &format!("{}_bus_busy_cycles", ch),
            self.epoch_bus_busy as f64,
        );
        for report in self.power_reports(channel, cycles, cfg) {
            let prefix = format!("{}_r{}", ch, report.rank);
            sink.record(&format!("{}_background_w", prefix), report.background_w);
            sink.record(&format!("{}_burst_w", prefix), report.burst_w);
            sink.record(&format!("{}_refresh_w", prefix), report.refresh_w);
            sink.record(&format!("{}_actpre_w", prefix), report.actpre_w);
        }
    }

    /// Clears the epoch-scoped counters and energies.
    pub fn reset_epoch(&mut self) {
        self.epoch_reads = 0;
        self.epoch_writes = 0;
        self.epoch_latency = 0;
        self.epoch_bus_busy = 0;
        for e in &mut self.rank_energy {
            *e = RankEnergy::default();
        }
    }

    /// Prints the lifetime summary for one channel.
    pub fn print_summary(&self, cycle: u64, cfg: &Config) {
        let done = self.reads_completed + self.writes_completed;
        let avg_latency = if done > 0 {
            self.total_latency as f64 / done as f64
        } else {
            0.0
        };
        let accesses = self.row_hits + self.row_misses;
        let hit_rate = if accesses > 0 {
            self.row_hits as f64 / accesses as f64 * 100.0
        } else {
            0.0
        };
        let busy_pct = if cycle > 0 {
            self.data_bus_busy as f64 / cycle as f64 * 100.0
        } else {
            0.0
        };

        println!("  cycles                 {}", cycle);
        println!(
            "  reads                  {} accepted, {} returned",
            self.reads_accepted, self.reads_completed
        );
        println!(
            "  writes                 {} accepted, {} returned",
            self.writes_accepted, self.writes_completed
        );
        println!(
            "  row buffer             {} hits / {} misses ({:.2}% hit)",
            self.row_hits, self.row_misses, hit_rate
        );
        println!(
            "  commands               {} total, {} ACT, {} PRE, {} REF",
            self.commands_issued, self.activates, self.precharges, self.refreshes
        );
        println!(
            "  avg latency            {:.2} cycles ({:.2} ns)",
            avg_latency,
            avg_latency * cfg.tck
        );
        println!("  data bus utilization   {:.2}%", busy_pct);
        if !self.latency_histogram.is_empty() {
            println!("  latency histogram (cycles -> count):");
            for (bin, count) in &self.latency_histogram {
                println!(
                    "    {:>6} - {:<6} {}",
                    bin,
                    bin + cfg.histogram_bin_size - 1,
                    count
                );
            }
        }
    }
}
