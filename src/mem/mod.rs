//! The memory-system core.
//!
//! Leaf to root: [`addressing`] maps byte addresses onto DRAM coordinates,
//! [`bank`] and [`rank`] hold the device state machines, [`queue`] stores
//! and selects pending bus commands, [`controller`] runs one channel's
//! scheduling loop, [`channel`] pairs a controller with its completion
//! callbacks, and [`system`] shards transactions across channels behind a
//! clock-domain crossing.

/// Byte address to (channel, rank, bank, row, column) mapping.
pub mod addressing;

/// Bank state machine and per-command next-legal cycles.
pub mod bank;

/// One channel: a memory controller plus its completion callbacks.
pub mod channel;

/// Bus command representation.
pub mod command;

/// The per-channel memory controller.
pub mod controller;

/// Pending-command FIFOs and the per-cycle selection scan.
pub mod queue;

/// Rank state: banks, activation window, refresh deadline, power state.
pub mod rank;

/// The multi-channel front end.
pub mod system;

/// Client-visible transactions and completions.
pub mod transaction;
