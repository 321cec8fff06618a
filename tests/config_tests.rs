//! Configuration tests: resolution, validation faults, INI loading, and
//! override precedence.

use dramsim::config::ini::{self, OptionsMap};
use dramsim::config::{
    AddressMappingScheme, Config, ConfigError, DeviceParams, QueuingStructure, RowBufferPolicy,
    SystemParams,
};
use std::io::Write;
use tempfile::NamedTempFile;

/// The default DDR3 part resolves to one 2 GB rank on one channel.
#[test]
fn test_default_resolution() {
    let cfg = Config::resolve(DeviceParams::default(), SystemParams::default(), 2048).unwrap();
    assert_eq!(cfg.num_chans, 1);
    assert_eq!(cfg.num_ranks, 1);
    assert_eq!(cfg.num_banks, 8);
    assert_eq!(cfg.devices_per_rank, 8);
    assert_eq!(cfg.transaction_bytes, 64);
    assert_eq!(cfg.byte_offset_bits, 6);
    assert_eq!(cfg.read_latency, 11);
    assert_eq!(cfg.write_latency, 8);
    assert_eq!(cfg.burst_cycles, 4);
    // 7800 ns at 1.25 ns per cycle.
    assert_eq!(cfg.t_refi, 6240);
}

/// Doubling the memory size doubles the rank count.
#[test]
fn test_rank_derivation() {
    let cfg = Config::resolve(DeviceParams::default(), SystemParams::default(), 4096).unwrap();
    assert_eq!(cfg.num_ranks, 2);
    assert_eq!(cfg.rank_bits, 1);
}

/// A non-power-of-two channel count is a construction-time fault.
#[test]
fn test_non_power_of_two_channels_rejected() {
    let system = SystemParams {
        num_chans: 3,
        ..SystemParams::default()
    };
    let err = Config::resolve(DeviceParams::default(), system, 2048).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("channel count"));
}

/// Zero channels is a construction-time fault.
#[test]
fn test_zero_channels_rejected() {
    let system = SystemParams {
        num_chans: 0,
        ..SystemParams::default()
    };
    let err = Config::resolve(DeviceParams::default(), system, 2048).unwrap_err();
    assert!(err.to_string().contains("zero channels"));
}

/// A memory size that is not a power of two is rejected.
#[test]
fn test_non_power_of_two_size_rejected() {
    let err =
        Config::resolve(DeviceParams::default(), SystemParams::default(), 3000).unwrap_err();
    assert!(err.to_string().contains("power of two"));
}

/// A size too small to hold one rank is rejected.
#[test]
fn test_size_smaller_than_rank_rejected() {
    let err = Config::resolve(DeviceParams::default(), SystemParams::default(), 1024).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const DEVICE_INI: &str = "\
; DDR3-1600 class device
NUM_BANKS=8
NUM_ROWS=32768
NUM_COLS=1024
DEVICE_WIDTH=8
tCK=1.25
CL=11
BL=8
tRCD=11
tRP=11
tRAS=28
tRC=39
tRFC=88
REFRESH_PERIOD=7800
";

const SYSTEM_INI: &str = "\
# system organization
NUM_CHANS=1
JEDEC_DATA_BUS_BITS=64
ROW_BUFFER_POLICY=open_page
ADDRESS_MAPPING_SCHEME=scheme7
QUEUING_STRUCTURE=per_bank ; trailing comment
";

/// The INI pair loads into a resolved config with comments stripped.
#[test]
fn test_ini_round_trip() {
    let device = write_temp(DEVICE_INI);
    let system = write_temp(SYSTEM_INI);
    let cfg = ini::load_config(
        device.path(),
        system.path(),
        &OptionsMap::new(),
        2048,
        true,
    )
    .unwrap();
    assert_eq!(cfg.cl, 11);
    assert!((cfg.tck - 1.25).abs() < 1e-9);
    assert_eq!(cfg.row_buffer_policy, RowBufferPolicy::OpenPage);
    assert_eq!(cfg.address_mapping_scheme, AddressMappingScheme::Scheme7);
    assert_eq!(cfg.queuing_structure, QueuingStructure::PerBank);
}

/// A missing required key surfaces as a descriptive parse fault.
#[test]
fn test_missing_required_key() {
    let device = write_temp("NUM_BANKS=8\nNUM_ROWS=32768\n");
    let system = write_temp(SYSTEM_INI);
    let err = ini::load_config(
        device.path(),
        system.path(),
        &OptionsMap::new(),
        2048,
        true,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("missing field"));
}

/// A line without '=' is rejected with its line number.
#[test]
fn test_malformed_ini_line() {
    let device = write_temp("NUM_BANKS=8\nthis is not a key value pair\n");
    let err = ini::read_ini_file(device.path()).unwrap_err();
    assert!(err.to_string().contains("line 2"));
}

/// A missing file is an I/O fault naming the path.
#[test]
fn test_missing_file() {
    let err = ini::read_ini_file(std::path::Path::new("/no/such/file.ini")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

/// Command-line overrides beat both INI files.
#[test]
fn test_override_precedence() {
    let device = write_temp(DEVICE_INI);
    let system = write_temp(SYSTEM_INI);
    let overrides = ini::parse_overrides("tRC=41,ROW_BUFFER_POLICY=closed_page").unwrap();
    let cfg = ini::load_config(device.path(), system.path(), &overrides, 2048, true).unwrap();
    assert_eq!(cfg.trc, 41);
    assert_eq!(cfg.row_buffer_policy, RowBufferPolicy::ClosedPage);
}

/// Override strings must be KEY=VALUE pairs.
#[test]
fn test_bad_override_string() {
    assert!(ini::parse_overrides("tRC").is_err());
    assert!(ini::parse_overrides("a=1,b=2").is_ok());
}

/// An unknown enum value is a parse fault, not a silent default.
#[test]
fn test_unknown_enum_value() {
    let device = write_temp(DEVICE_INI);
    let system = write_temp("NUM_CHANS=1\nJEDEC_DATA_BUS_BITS=64\nROW_BUFFER_POLICY=half_open\n");
    let err = ini::load_config(
        device.path(),
        system.path(),
        &OptionsMap::new(),
        2048,
        true,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}
