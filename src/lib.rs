//! Cycle-accurate DRAM memory-system simulator library.
//!
//! This crate models the internal timing of a DDR-family memory system: bank
//! state machines, row buffers, command scheduling, rank and channel
//! parallelism, refresh, and power. A client submits cache-line transactions
//! at byte addresses, advances simulated time one cycle at a time, and is
//! notified when each transaction completes with a latency that reflects
//! contention and JEDEC timing constraints.
//!
//! # Architecture
//!
//! * **Front end**: `mem::system::MemorySystem` shards transactions across
//!   channels by address mapping and crosses the host clock into the DRAM
//!   clock domain.
//! * **Per channel**: a `mem::controller::MemoryController` decomposes
//!   transactions into bus commands, schedules at most one command per
//!   cycle, drives its ranks, and emits completions.
//! * **Driver**: `sim` provides the trace-file formats and run loops used by
//!   the `dramsim` binary.
//!
//! # Modules
//!
//! * `config`: device/system parameters, INI loading, derived timing.
//! * `mem`: address mapping, banks, ranks, command queues, controllers,
//!   channels, and the multi-channel front end.
//! * `clock`: rational clock-domain crossing.
//! * `stats`: counters, latency histograms, and the per-rank power model.
//! * `output`: vis CSV, verification dump, and run-log sinks.
//! * `sim`: trace parsing and the trace-driven simulation loops.

/// Configuration loading, validation, and derived timing values.
pub mod config;

/// Rational clock-domain crossing between the host and DRAM clocks.
pub mod clock;

/// The memory-system core: addressing, banks, ranks, queues, controllers,
/// channels, and the multi-channel front end.
pub mod mem;

/// Statistics collection, latency histograms, and the power model.
pub mod stats;

/// File sinks: vis CSV writer, command verification dump, run log.
pub mod output;

/// Trace-file parsing and the trace-driven simulation harness.
pub mod sim;
