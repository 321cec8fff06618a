//! Trace-driven simulation harness.
//!
//! `trace` decodes the supported trace-file formats into transactions;
//! `driver` feeds them into a memory system and accounts for completions.

/// The run loops and driver-side bookkeeping.
pub mod driver;

/// Trace-file formats and line parsing.
pub mod trace;
