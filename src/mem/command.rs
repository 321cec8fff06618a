//! Bus commands.
//!
//! A transaction decomposes into an ordered sequence of these; the
//! scheduler drives at most one onto the channel's command bus per cycle.

use std::fmt;

/// Command encoding on the shared command bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Activate,
    Read,
    Write,
    ReadAutoPrecharge,
    WriteAutoPrecharge,
    Precharge,
    PrechargeAll,
    Refresh,
    PowerDownEnter,
    PowerDownExit,
}

impl CommandKind {
    /// True for the four column-access commands.
    pub fn is_column(self) -> bool {
        matches!(
            self,
            CommandKind::Read
                | CommandKind::Write
                | CommandKind::ReadAutoPrecharge
                | CommandKind::WriteAutoPrecharge
        )
    }

    /// True for READ and READ with auto-precharge.
    pub fn is_read(self) -> bool {
        matches!(self, CommandKind::Read | CommandKind::ReadAutoPrecharge)
    }

    /// True for WRITE and WRITE with auto-precharge.
    pub fn is_write(self) -> bool {
        matches!(self, CommandKind::Write | CommandKind::WriteAutoPrecharge)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandKind::Activate => "ACT",
            CommandKind::Read => "READ",
            CommandKind::Write => "WRITE",
            CommandKind::ReadAutoPrecharge => "READ_P",
            CommandKind::WriteAutoPrecharge => "WRITE_P",
            CommandKind::Precharge => "PRE",
            CommandKind::PrechargeAll => "PRE_ALL",
            CommandKind::Refresh => "REF",
            CommandKind::PowerDownEnter => "PDN",
            CommandKind::PowerDownExit => "PUP",
        };
        write!(f, "{}", s)
    }
}

/// One command plus its destination coordinates.
///
/// Data-bearing commands carry the id of the transaction they serve so the
/// returned burst can be matched back up.
#[derive(Debug, Clone, Copy)]
pub struct BusCommand {
    pub kind: CommandKind,
    pub rank: usize,
    pub bank: usize,
    pub row: u64,
    pub column: u64,
    pub transaction_id: u64,
    pub address: u64,
}

impl BusCommand {
    /// A command with no data-bearing payload (precharge, refresh, power).
    pub fn control(kind: CommandKind, rank: usize, bank: usize) -> Self {
        Self {
            kind,
            rank,
            bank,
            row: 0,
            column: 0,
            transaction_id: 0,
            address: 0,
        }
    }
}

impl fmt::Display for BusCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} r{} b{} row 0x{:x} col 0x{:x}",
            self.kind, self.rank, self.bank, self.row, self.column
        )
    }
}
