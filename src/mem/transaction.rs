//! Client-visible transactions and completions.

use std::fmt;

/// Opaque payload carried by a write (and routed back by a read) when
/// storage mode is enabled. The core never interprets the bytes.
pub type DataBuffer = Vec<u8>;

/// Direction of a memory transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Read,
    Write,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Read => write!(f, "READ"),
            TransactionKind::Write => write!(f, "WRITE"),
        }
    }
}

/// One cache-line-sized memory request.
///
/// Created by the client (or decoded from a trace line); the controller
/// takes ownership on acceptance, aligns the address, assigns the id and
/// arrival cycle, and destroys the transaction after its completion
/// callback has fired.
#[derive(Debug)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub address: u64,
    pub data: Option<DataBuffer>,
    /// DRAM cycle at which the controller accepted the transaction.
    pub arrival_cycle: u64,
    /// Assigned on acceptance; zero until then.
    pub id: u64,
}

impl Transaction {
    /// Creates a transaction awaiting acceptance.
    pub fn new(kind: TransactionKind, address: u64, data: Option<DataBuffer>) -> Self {
        Self {
            kind,
            address,
            data,
            arrival_cycle: 0,
            id: 0,
        }
    }
}

/// Delivered to the client exactly once per accepted transaction.
#[derive(Debug)]
pub struct Completion {
    pub transaction_id: u64,
    pub address: u64,
    /// DRAM cycle at which the last data beat was latched (reads) or
    /// driven (writes).
    pub done_cycle: u64,
    pub kind: TransactionKind,
    /// Present only in storage mode.
    pub data: Option<DataBuffer>,
}
