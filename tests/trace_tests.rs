//! Trace-format tests: detection by filename prefix and line parsing for
//! the k6, mase, misc, and KISS dialects.

use dramsim::mem::transaction::TransactionKind;
use dramsim::sim::trace::{self, TraceFormat};
use std::path::Path;

/// Format detection keys off the basename prefix before the first '_'.
#[test]
fn test_detect_format_by_prefix() {
    assert_eq!(
        trace::detect_format(Path::new("traces/k6_aoe_02_short.trc")).unwrap(),
        TraceFormat::K6
    );
    assert_eq!(
        trace::detect_format(Path::new("mase_art.trc")).unwrap(),
        TraceFormat::Mase
    );
    assert_eq!(
        trace::detect_format(Path::new("/tmp/misc_test.trc")).unwrap(),
        TraceFormat::Misc
    );
    assert!(trace::detect_format(Path::new("random_file.trc")).is_err());
}

/// k6 command tokens: the two write tokens and the four read tokens.
#[test]
fn test_k6_commands() {
    let cases = [
        ("P_MEM_WR", TransactionKind::Write),
        ("BOFF", TransactionKind::Write),
        ("P_FETCH", TransactionKind::Read),
        ("P_MEM_RD", TransactionKind::Read),
        ("P_LOCK_RD", TransactionKind::Read),
        ("P_LOCK_WR", TransactionKind::Read),
    ];
    for (token, kind) in cases {
        let line = format!("0x7ffe0040 {} 125", token);
        let record = trace::parse_line(TraceFormat::K6, &line, 1, true)
            .unwrap()
            .unwrap();
        assert_eq!(record.kind, kind, "token {}", token);
        assert_eq!(record.address, 0x7ffe0040);
        assert_eq!(record.cycle, 125);
    }
}

/// An unknown k6 token is fatal and names the line.
#[test]
fn test_k6_unknown_command() {
    let err = trace::parse_line(TraceFormat::K6, "0x100 P_BOGUS 1", 7, true).unwrap_err();
    assert!(err.to_string().contains("line 7"));
}

/// mase lines carry IFETCH/READ/WRITE.
#[test]
fn test_mase_commands() {
    let record = trace::parse_line(TraceFormat::Mase, "0x2000 IFETCH 3", 1, true)
        .unwrap()
        .unwrap();
    assert_eq!(record.kind, TransactionKind::Read);
    let record = trace::parse_line(TraceFormat::Mase, "0x2000 WRITE 3", 1, true)
        .unwrap()
        .unwrap();
    assert_eq!(record.kind, TransactionKind::Write);
}

/// Ignoring the clock column forces every record to cycle zero.
#[test]
fn test_notiming_zeroes_cycles() {
    let record = trace::parse_line(TraceFormat::Mase, "0x2000 READ 999", 1, false)
        .unwrap()
        .unwrap();
    assert_eq!(record.cycle, 0);
}

/// misc lines put the cycle first and may carry a 32-byte payload on
/// writes.
#[test]
fn test_misc_with_payload() {
    let hex = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
    let line = format!("42 0x1f00 write {}", hex);
    let record = trace::parse_line(TraceFormat::Misc, &line, 1, true)
        .unwrap()
        .unwrap();
    assert_eq!(record.cycle, 42);
    assert_eq!(record.address, 0x1f00);
    assert_eq!(record.kind, TransactionKind::Write);
    let data = record.data.expect("payload");
    assert_eq!(data.len(), 32);
    assert_eq!(&data[..4], &[0x00, 0x11, 0x22, 0x33]);
}

/// misc reads take no payload.
#[test]
fn test_misc_read() {
    let record = trace::parse_line(TraceFormat::Misc, "7 0x80 read", 1, true)
        .unwrap()
        .unwrap();
    assert_eq!(record.kind, TransactionKind::Read);
    assert!(record.data.is_none());
}

/// misc command tokens are lowercase; anything else is fatal.
#[test]
fn test_misc_bad_command() {
    assert!(trace::parse_line(TraceFormat::Misc, "7 0x80 READ", 1, true).is_err());
}

/// Blank lines are skipped, malformed lines are fatal with a reason.
#[test]
fn test_blank_and_malformed_lines() {
    assert!(trace::parse_line(TraceFormat::K6, "   ", 1, true)
        .unwrap()
        .is_none());
    let err = trace::parse_line(TraceFormat::K6, "0x100", 3, true).unwrap_err();
    assert!(err.to_string().contains("line 3"));
    assert!(trace::parse_line(TraceFormat::Misc, "nonhex 0x80 read", 1, true).is_err());
}

/// KISS lines are three integers; even ops read, odd ops write.
#[test]
fn test_kiss_lines() {
    let record = trace::parse_kiss_line("100 0 4096", 1).unwrap().unwrap();
    assert_eq!(record.cycle, 100);
    assert_eq!(record.kind, TransactionKind::Read);
    assert_eq!(record.address, 4096);

    let record = trace::parse_kiss_line("100 3 4096", 1).unwrap().unwrap();
    assert_eq!(record.kind, TransactionKind::Write);
}

/// KISS comments and blank lines are skipped; wrong field counts are
/// fatal.
#[test]
fn test_kiss_comments_and_errors() {
    assert!(trace::parse_kiss_line("# header", 1).unwrap().is_none());
    assert!(trace::parse_kiss_line("100 0 4096 # inline", 1)
        .unwrap()
        .is_some());
    assert!(trace::parse_kiss_line("", 1).unwrap().is_none());
    let err = trace::parse_kiss_line("100 0", 9).unwrap_err();
    assert!(err.to_string().contains("three numbers"));
}
