//! Clock-domain crossing.
//!
//! The host (a CPU model or trace driver) and the DRAM core run at
//! different frequencies. The crosser converts host ticks into DRAM ticks
//! with pure integer arithmetic so that after N host ticks exactly
//! `floor(N * dram_hz / host_hz)` DRAM ticks have been delivered, with no
//! accumulated drift for any rational ratio.

/// Bresenham-style rational clock stepper.
///
/// Each host tick deposits `dram_hz` into an accumulator; every `host_hz`
/// of accumulated credit pays for one DRAM tick. The remainder carries
/// across calls, which is what keeps the long-run ratio exact.
#[derive(Debug, Clone)]
pub struct ClockDomainCrosser {
    dram_hz: u64,
    host_hz: u64,
    accumulator: u64,
}

impl ClockDomainCrosser {
    /// Creates a crosser for the given frequency pair.
    ///
    /// A `host_hz` of zero means "no host clock", which collapses to a
    /// 1:1 ratio.
    pub fn new(dram_hz: u64, host_hz: u64) -> Self {
        let host_hz = if host_hz == 0 { dram_hz } else { host_hz };
        Self {
            dram_hz,
            host_hz,
            accumulator: 0,
        }
    }

    /// Registers one host tick and returns the number of DRAM ticks now
    /// owed.
    pub fn advance(&mut self) -> u64 {
        // 1:1 is the common trace-driver case; skip the arithmetic.
        if self.dram_hz == self.host_hz {
            return 1;
        }
        self.accumulator += self.dram_hz;
        let ticks = self.accumulator / self.host_hz;
        self.accumulator -= ticks * self.host_hz;
        ticks
    }

    /// The DRAM-side frequency in Hz.
    pub fn dram_hz(&self) -> u64 {
        self.dram_hz
    }

    /// The host-side frequency in Hz.
    pub fn host_hz(&self) -> u64 {
        self.host_hz
    }
}
