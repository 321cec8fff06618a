//! Trace-file formats.
//!
//! Three line-oriented legacy formats are auto-detected from the part of
//! the trace filename before the first underscore, plus the bare
//! three-integer KISS format selected explicitly by the driver. A
//! malformed line is fatal and is reported with its line number.

use crate::mem::transaction::{DataBuffer, TransactionKind};
use std::error::Error;
use std::fmt;
use std::path::Path;

/// Auto-detected trace dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    /// `<hex_addr> <cmd> <cycle>` with K6-era command tokens.
    K6,
    /// `<hex_addr> <cmd> <cycle>` with `IFETCH`/`READ`/`WRITE`.
    Mase,
    /// `<cycle> <hex_addr> <cmd>[ <hex_data>]`, lowercase commands, with
    /// an optional 32-byte payload.
    Misc,
}

/// A trace-parse fault. Always fatal to the driver.
#[derive(Debug)]
pub enum TraceError {
    UnknownFormat(String),
    Malformed {
        line_no: usize,
        line: String,
        reason: String,
    },
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::UnknownFormat(prefix) => {
                write!(f, "unknown tracefile type '{}'", prefix)
            }
            TraceError::Malformed {
                line_no,
                line,
                reason,
            } => write!(f, "trace line {}: {} ('{}')", line_no, reason, line),
        }
    }
}

impl Error for TraceError {}

/// One decoded trace entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    /// Host cycle at which the request becomes eligible for issue.
    pub cycle: u64,
    pub kind: TransactionKind,
    pub address: u64,
    pub data: Option<DataBuffer>,
}

/// Detects the trace dialect from the filename prefix before the first
/// underscore.
pub fn detect_format(path: &Path) -> Result<TraceFormat, TraceError> {
    let base = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = base.split('_').next().unwrap_or("");
    match prefix {
        "k6" => Ok(TraceFormat::K6),
        "mase" => Ok(TraceFormat::Mase),
        "misc" => Ok(TraceFormat::Misc),
        other => Err(TraceError::UnknownFormat(other.to_string())),
    }
}

fn malformed(line_no: usize, line: &str, reason: impl Into<String>) -> TraceError {
    TraceError::Malformed {
        line_no,
        line: line.to_string(),
        reason: reason.into(),
    }
}

fn parse_hex(token: &str, line_no: usize, line: &str) -> Result<u64, TraceError> {
    let digits = token.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16)
        .map_err(|_| malformed(line_no, line, format!("bad hex value '{}'", token)))
}

fn parse_dec(token: &str, line_no: usize, line: &str) -> Result<u64, TraceError> {
    token
        .parse::<u64>()
        .map_err(|_| malformed(line_no, line, format!("bad number '{}'", token)))
}

/// Parses one line of a detected-format trace.
///
/// Returns `Ok(None)` for blank lines. With `use_clock_cycle` false the
/// record's cycle stays zero, which lets every request issue immediately.
pub fn parse_line(
    format: TraceFormat,
    line: &str,
    line_no: usize,
    use_clock_cycle: bool,
) -> Result<Option<TraceRecord>, TraceError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();

    match format {
        TraceFormat::K6 | TraceFormat::Mase => {
            if tokens.len() < 3 {
                return Err(malformed(line_no, line, "expected <addr> <cmd> <cycle>"));
            }
            let address = parse_hex(tokens[0], line_no, line)?;
            let kind = match (format, tokens[1]) {
                (TraceFormat::K6, "P_MEM_WR") | (TraceFormat::K6, "BOFF") => {
                    TransactionKind::Write
                }
                (TraceFormat::K6, "P_FETCH")
                | (TraceFormat::K6, "P_MEM_RD")
                | (TraceFormat::K6, "P_LOCK_RD")
                | (TraceFormat::K6, "P_LOCK_WR") => TransactionKind::Read,
                (TraceFormat::Mase, "IFETCH") | (TraceFormat::Mase, "READ") => {
                    TransactionKind::Read
                }
                (TraceFormat::Mase, "WRITE") => TransactionKind::Write,
                (_, cmd) => {
                    return Err(malformed(line_no, line, format!("unknown command '{}'", cmd)))
                }
            };
            let cycle = if use_clock_cycle {
                parse_dec(tokens[2], line_no, line)?
            } else {
                0
            };
            Ok(Some(TraceRecord {
                cycle,
                kind,
                address,
                data: None,
            }))
        }
        TraceFormat::Misc => {
            if tokens.len() < 3 {
                return Err(malformed(line_no, line, "expected <cycle> <addr> <cmd>"));
            }
            let cycle = if use_clock_cycle {
                parse_dec(tokens[0], line_no, line)?
            } else {
                0
            };
            let address = parse_hex(tokens[1], line_no, line)?;
            let kind = match tokens[2] {
                "read" => TransactionKind::Read,
                "write" => TransactionKind::Write,
                cmd => {
                    return Err(malformed(line_no, line, format!("invalid command '{}'", cmd)))
                }
            };
            let data = match tokens.get(3) {
                Some(hex) if kind == TransactionKind::Write => {
                    Some(parse_misc_data(hex, line_no, line)?)
                }
                _ => None,
            };
            Ok(Some(TraceRecord {
                cycle,
                kind,
                address,
                data,
            }))
        }
    }
}

/// Decodes the 32-byte misc payload: four 16-hex-digit words.
fn parse_misc_data(hex: &str, line_no: usize, line: &str) -> Result<DataBuffer, TraceError> {
    let mut data = Vec::with_capacity(32);
    for i in 0..4 {
        let start = i * 16;
        if start >= hex.len() {
            break;
        }
        let end = (start + 16).min(hex.len());
        let word = u64::from_str_radix(&hex[start..end], 16)
            .map_err(|_| malformed(line_no, line, "bad data payload"))?;
        data.extend_from_slice(&word.to_be_bytes());
    }
    data.resize(32, 0);
    Ok(data)
}

/// Parses one line of a KISS trace: `<cycle> <op> <addr>` as bare
/// integers, with `#` starting a comment. Even ops are reads, odd writes.
pub fn parse_kiss_line(line: &str, line_no: usize) -> Result<Option<TraceRecord>, TraceError> {
    let text = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(None);
    }
    if tokens.len() != 3 {
        return Err(malformed(
            line_no,
            line,
            format!("expected exactly three numbers, got {}", tokens.len()),
        ));
    }
    let cycle = parse_dec(tokens[0], line_no, line)?;
    let op = parse_dec(tokens[1], line_no, line)?;
    let address = parse_dec(tokens[2], line_no, line)?;
    let kind = if op % 2 == 0 {
        TransactionKind::Read
    } else {
        TransactionKind::Write
    };
    Ok(Some(TraceRecord {
        cycle,
        kind,
        address,
        data: None,
    }))
}
