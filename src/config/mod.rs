//! Memory-system configuration.
//!
//! Parameters arrive in two legacy `KEY=VALUE` INI files (device-level
//! timing and geometry, system-level organization and policy), optionally
//! patched by command-line overrides. The raw key/value set is lowered to a
//! TOML document and deserialized into typed parameter structs, then
//! resolved into an immutable [`Config`] carrying every derived value the
//! core needs. All validation happens at resolution time, before the first
//! simulated cycle.

use serde::Deserialize;
use std::error::Error;
use std::fmt;

pub mod ini;

/// Row-buffer retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowBufferPolicy {
    /// Rows stay open after a column access; later accesses to the same row
    /// skip the ACTIVATE.
    OpenPage,
    /// Every column access auto-precharges; the bank returns to idle.
    ClosedPage,
}

/// Field ordering used to split a byte address into DRAM coordinates.
///
/// Names list the fields from low bits to high bits, above the dropped
/// byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressMappingScheme {
    /// chan, bank, rank, col, row
    Scheme1,
    /// chan, rank, bank, col, row
    Scheme2,
    /// chan, col, rank, bank, row
    Scheme3,
    /// chan, col, bank, rank, row
    Scheme4,
    /// bank, rank, chan, col, row
    Scheme5,
    /// rank, bank, chan, col, row
    Scheme6,
    /// col, chan, bank, rank, row
    Scheme7,
    /// bank, rank, col, row, chan
    Scheme8,
}

/// Order in which the scheduler walks the command queues each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    /// Exhaust one rank's banks in round-robin order before the next rank.
    RankThenBankRoundRobin,
    /// For each bank index, try every rank before the next bank.
    BankThenRankRoundRobin,
}

/// Shape of the pending-command storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuingStructure {
    /// One FIFO per rank, shared by all of its banks.
    PerRank,
    /// One FIFO per (rank, bank) pair.
    PerBank,
}

impl fmt::Display for RowBufferPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowBufferPolicy::OpenPage => write!(f, "open_page"),
            RowBufferPolicy::ClosedPage => write!(f, "closed_page"),
        }
    }
}

impl fmt::Display for AddressMappingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            AddressMappingScheme::Scheme1 => 1,
            AddressMappingScheme::Scheme2 => 2,
            AddressMappingScheme::Scheme3 => 3,
            AddressMappingScheme::Scheme4 => 4,
            AddressMappingScheme::Scheme5 => 5,
            AddressMappingScheme::Scheme6 => 6,
            AddressMappingScheme::Scheme7 => 7,
            AddressMappingScheme::Scheme8 => 8,
        };
        write!(f, "scheme{}", n)
    }
}

impl fmt::Display for QueuingStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueuingStructure::PerRank => write!(f, "per_rank"),
            QueuingStructure::PerBank => write!(f, "per_bank"),
        }
    }
}

/// Device-level parameters, as read from the device INI file.
///
/// Timing values are in DRAM clock cycles except `tCK` (nanoseconds) and
/// `REFRESH_PERIOD` (nanoseconds). Fields without a serde default are
/// required keys; omitting one is a configuration fault.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceParams {
    #[serde(rename = "NUM_BANKS")]
    pub num_banks: u64,
    #[serde(rename = "NUM_ROWS")]
    pub num_rows: u64,
    #[serde(rename = "NUM_COLS")]
    pub num_cols: u64,
    #[serde(rename = "DEVICE_WIDTH")]
    pub device_width: u64,
    #[serde(rename = "tCK")]
    pub tck: f64,
    #[serde(rename = "CL")]
    pub cl: u64,
    #[serde(rename = "BL")]
    pub bl: u64,
    #[serde(rename = "tRCD")]
    pub trcd: u64,
    #[serde(rename = "tRP")]
    pub trp: u64,
    #[serde(rename = "tRAS")]
    pub tras: u64,
    #[serde(rename = "tRC")]
    pub trc: u64,
    #[serde(rename = "tRFC")]
    pub trfc: u64,
    #[serde(rename = "REFRESH_PERIOD")]
    pub refresh_period: f64,

    #[serde(rename = "AL", default = "default_al")]
    pub al: u64,
    #[serde(rename = "CWL", default = "default_cwl")]
    pub cwl: u64,
    #[serde(rename = "tCCD", default = "default_tccd")]
    pub tccd: u64,
    #[serde(rename = "tRTP", default = "default_trtp")]
    pub trtp: u64,
    #[serde(rename = "tWTR", default = "default_twtr")]
    pub twtr: u64,
    #[serde(rename = "tWR", default = "default_twr")]
    pub twr: u64,
    #[serde(rename = "tRTRS", default = "default_trtrs")]
    pub trtrs: u64,
    #[serde(rename = "tRRD", default = "default_trrd")]
    pub trrd: u64,
    #[serde(rename = "tFAW", default = "default_tfaw")]
    pub tfaw: u64,
    #[serde(rename = "tCKE", default = "default_tcke")]
    pub tcke: u64,
    #[serde(rename = "tXP", default = "default_txp")]
    pub txp: u64,

    #[serde(rename = "IDD0", default = "default_idd0")]
    pub idd0: u64,
    #[serde(rename = "IDD2N", default = "default_idd2n")]
    pub idd2n: u64,
    #[serde(rename = "IDD2P", default = "default_idd2p")]
    pub idd2p: u64,
    #[serde(rename = "IDD3N", default = "default_idd3n")]
    pub idd3n: u64,
    #[serde(rename = "IDD4R", default = "default_idd4r")]
    pub idd4r: u64,
    #[serde(rename = "IDD4W", default = "default_idd4w")]
    pub idd4w: u64,
    #[serde(rename = "IDD5", default = "default_idd5")]
    pub idd5: u64,
    #[serde(rename = "Vdd", default = "default_vdd")]
    pub vdd: f64,
}

impl Default for DeviceParams {
    /// A DDR3-1600-class part: 8 banks, 32K rows, 1K columns, x8 devices.
    fn default() -> Self {
        Self {
            num_banks: 8,
            num_rows: 32768,
            num_cols: 1024,
            device_width: 8,
            tck: 1.25,
            cl: 11,
            bl: 8,
            trcd: 11,
            trp: 11,
            tras: 28,
            trc: 39,
            trfc: 88,
            refresh_period: 7800.0,
            al: default_al(),
            cwl: default_cwl(),
            tccd: default_tccd(),
            trtp: default_trtp(),
            twtr: default_twtr(),
            twr: default_twr(),
            trtrs: default_trtrs(),
            trrd: default_trrd(),
            tfaw: default_tfaw(),
            tcke: default_tcke(),
            txp: default_txp(),
            idd0: default_idd0(),
            idd2n: default_idd2n(),
            idd2p: default_idd2p(),
            idd3n: default_idd3n(),
            idd4r: default_idd4r(),
            idd4w: default_idd4w(),
            idd5: default_idd5(),
            vdd: default_vdd(),
        }
    }
}

/// System-level parameters, as read from the system INI file.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemParams {
    #[serde(rename = "NUM_CHANS")]
    pub num_chans: u64,
    #[serde(rename = "JEDEC_DATA_BUS_BITS")]
    pub jedec_data_bus_bits: u64,

    #[serde(rename = "TRANS_QUEUE_DEPTH", default = "default_queue_depth")]
    pub trans_queue_depth: usize,
    #[serde(rename = "CMD_QUEUE_DEPTH", default = "default_queue_depth")]
    pub cmd_queue_depth: usize,
    #[serde(rename = "EPOCH_LENGTH", default = "default_epoch_length")]
    pub epoch_length: u64,
    #[serde(rename = "ROW_BUFFER_POLICY", default = "default_row_policy")]
    pub row_buffer_policy: RowBufferPolicy,
    #[serde(rename = "ADDRESS_MAPPING_SCHEME", default = "default_scheme")]
    pub address_mapping_scheme: AddressMappingScheme,
    #[serde(rename = "SCHEDULING_POLICY", default = "default_sched_policy")]
    pub scheduling_policy: SchedulingPolicy,
    #[serde(rename = "QUEUING_STRUCTURE", default = "default_queuing")]
    pub queuing_structure: QueuingStructure,
    #[serde(rename = "USE_LOW_POWER", default)]
    pub use_low_power: bool,
    #[serde(rename = "STORE_DATA", default)]
    pub store_data: bool,
    #[serde(rename = "VIS_FILE_OUTPUT", default = "default_true")]
    pub vis_file_output: bool,
    #[serde(rename = "VERIFICATION_OUTPUT", default)]
    pub verification_output: bool,
    #[serde(rename = "LOG_OUTPUT", default)]
    pub log_output: bool,
    #[serde(rename = "HISTOGRAM_BIN_SIZE", default = "default_bin_size")]
    pub histogram_bin_size: u64,
}

impl Default for SystemParams {
    fn default() -> Self {
        Self {
            num_chans: 1,
            jedec_data_bus_bits: 64,
            trans_queue_depth: default_queue_depth(),
            cmd_queue_depth: default_queue_depth(),
            epoch_length: default_epoch_length(),
            row_buffer_policy: default_row_policy(),
            address_mapping_scheme: default_scheme(),
            scheduling_policy: default_sched_policy(),
            queuing_structure: default_queuing(),
            use_low_power: false,
            store_data: false,
            vis_file_output: default_true(),
            verification_output: false,
            log_output: false,
            histogram_bin_size: default_bin_size(),
        }
    }
}

fn default_al() -> u64 {
    0
}

fn default_cwl() -> u64 {
    8
}

fn default_tccd() -> u64 {
    4
}

fn default_trtp() -> u64 {
    6
}

fn default_twtr() -> u64 {
    6
}

fn default_twr() -> u64 {
    12
}

fn default_trtrs() -> u64 {
    1
}

fn default_trrd() -> u64 {
    5
}

fn default_tfaw() -> u64 {
    24
}

fn default_tcke() -> u64 {
    4
}

fn default_txp() -> u64 {
    5
}

fn default_idd0() -> u64 {
    110
}

fn default_idd2n() -> u64 {
    55
}

fn default_idd2p() -> u64 {
    25
}

fn default_idd3n() -> u64 {
    60
}

fn default_idd4r() -> u64 {
    215
}

fn default_idd4w() -> u64 {
    220
}

fn default_idd5() -> u64 {
    240
}

fn default_vdd() -> f64 {
    1.5
}

fn default_queue_depth() -> usize {
    32
}

fn default_epoch_length() -> u64 {
    100_000
}

fn default_row_policy() -> RowBufferPolicy {
    RowBufferPolicy::OpenPage
}

fn default_scheme() -> AddressMappingScheme {
    AddressMappingScheme::Scheme2
}

fn default_sched_policy() -> SchedulingPolicy {
    SchedulingPolicy::RankThenBankRoundRobin
}

fn default_queuing() -> QueuingStructure {
    QueuingStructure::PerRank
}

fn default_true() -> bool {
    true
}

fn default_bin_size() -> u64 {
    10
}

/// A pre-simulation configuration fault. These terminate the run before any
/// cycle executes.
#[derive(Debug)]
pub enum ConfigError {
    /// A configuration file could not be read.
    Io { path: String, message: String },
    /// A key/value set failed to deserialize (missing required key, bad
    /// value type, unknown enum variant).
    Parse { source: String, message: String },
    /// The parameters deserialized but are not a legal memory system.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "cannot read config file '{}': {}", path, message)
            }
            ConfigError::Parse { source, message } => {
                write!(f, "bad configuration in {}: {}", source, message)
            }
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl Error for ConfigError {}

/// Returns true if `x` is a nonzero power of two.
pub fn is_power_of_two(x: u64) -> bool {
    x != 0 && (x & (x - 1)) == 0
}

/// log2 of a power of two.
fn log2(x: u64) -> u32 {
    debug_assert!(is_power_of_two(x));
    x.trailing_zeros()
}

/// Immutable bundle of device and system parameters plus every derived
/// value the core consumes. Built once by [`Config::resolve`]; never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    // Geometry.
    pub num_chans: u64,
    pub num_ranks: u64,
    pub num_banks: u64,
    pub num_rows: u64,
    pub num_cols: u64,
    pub device_width: u64,
    pub jedec_data_bus_bits: u64,
    pub megs_of_memory: u64,

    // Timing, in DRAM cycles unless noted.
    pub tck: f64,
    pub cl: u64,
    pub al: u64,
    pub cwl: u64,
    pub bl: u64,
    pub trcd: u64,
    pub trp: u64,
    pub tras: u64,
    pub trc: u64,
    pub trfc: u64,
    pub tccd: u64,
    pub trtp: u64,
    pub twtr: u64,
    pub twr: u64,
    pub trtrs: u64,
    pub trrd: u64,
    pub tfaw: u64,
    pub tcke: u64,
    pub txp: u64,

    // Power model, mA draws and supply voltage.
    pub idd0: u64,
    pub idd2n: u64,
    pub idd2p: u64,
    pub idd3n: u64,
    pub idd4r: u64,
    pub idd4w: u64,
    pub idd5: u64,
    pub vdd: f64,

    // Policy.
    pub row_buffer_policy: RowBufferPolicy,
    pub address_mapping_scheme: AddressMappingScheme,
    pub scheduling_policy: SchedulingPolicy,
    pub queuing_structure: QueuingStructure,
    pub trans_queue_depth: usize,
    pub cmd_queue_depth: usize,
    pub epoch_length: u64,
    pub use_low_power: bool,
    pub store_data: bool,
    pub vis_file_output: bool,
    pub verification_output: bool,
    pub log_output: bool,
    pub histogram_bin_size: u64,

    // Derived.
    /// Read latency: AL + CL.
    pub read_latency: u64,
    /// Write latency: AL + CWL.
    pub write_latency: u64,
    /// Cycles one burst occupies the data bus: BL / 2.
    pub burst_cycles: u64,
    /// Bytes moved by one transaction: BL * bus width.
    pub transaction_bytes: u64,
    /// Nominal cycles between per-rank refreshes.
    pub t_refi: u64,
    /// Devices ganged per rank: bus bits / device width.
    pub devices_per_rank: u64,

    // Address field widths, in bits.
    pub chan_bits: u32,
    pub rank_bits: u32,
    pub bank_bits: u32,
    pub row_bits: u32,
    pub col_bits: u32,
    pub byte_offset_bits: u32,
}

impl Config {
    /// Resolves raw parameters and a total memory size into a validated
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for any geometry or policy
    /// combination that cannot describe a real memory system: sizes that
    /// are not powers of two, a zero channel count, a bus the devices do
    /// not divide, or a total size that does not split evenly into ranks.
    pub fn resolve(
        device: DeviceParams,
        system: SystemParams,
        megs_of_memory: u64,
    ) -> Result<Config, ConfigError> {
        if !is_power_of_two(megs_of_memory) {
            return Err(ConfigError::Invalid(format!(
                "memory size must be a power of two megabytes, got {}",
                megs_of_memory
            )));
        }
        if system.num_chans == 0 {
            return Err(ConfigError::Invalid("zero channels".to_string()));
        }
        if !is_power_of_two(system.num_chans) {
            return Err(ConfigError::Invalid(format!(
                "channel count must be a power of two, got {}",
                system.num_chans
            )));
        }
        for (name, value) in [
            ("NUM_BANKS", device.num_banks),
            ("NUM_ROWS", device.num_rows),
            ("NUM_COLS", device.num_cols),
            ("BL", device.bl),
            ("DEVICE_WIDTH", device.device_width),
            ("JEDEC_DATA_BUS_BITS", system.jedec_data_bus_bits),
        ] {
            if !is_power_of_two(value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a power of two, got {}",
                    name, value
                )));
            }
        }
        if system.jedec_data_bus_bits % device.device_width != 0 {
            return Err(ConfigError::Invalid(format!(
                "DEVICE_WIDTH {} does not divide JEDEC_DATA_BUS_BITS {}",
                device.device_width, system.jedec_data_bus_bits
            )));
        }
        if device.tck <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tCK must be positive, got {}",
                device.tck
            )));
        }

        let devices_per_rank = system.jedec_data_bus_bits / device.device_width;
        let rank_bytes = device.num_rows
            * device.num_cols
            * device.num_banks
            * device.device_width
            * devices_per_rank
            / 8;
        let megs_per_rank = rank_bytes / (1024 * 1024);
        if megs_per_rank == 0 {
            return Err(ConfigError::Invalid(
                "device geometry smaller than one megabyte per rank".to_string(),
            ));
        }
        let total_megs_per_chan = megs_of_memory / system.num_chans;
        if total_megs_per_chan == 0 || total_megs_per_chan % megs_per_rank != 0 {
            return Err(ConfigError::Invalid(format!(
                "{} MB per channel does not divide into {} MB ranks",
                total_megs_per_chan, megs_per_rank
            )));
        }
        let num_ranks = total_megs_per_chan / megs_per_rank;
        if !is_power_of_two(num_ranks) {
            return Err(ConfigError::Invalid(format!(
                "derived rank count {} is not a power of two",
                num_ranks
            )));
        }

        if system.epoch_length == 0 {
            return Err(ConfigError::Invalid("EPOCH_LENGTH must be nonzero".to_string()));
        }
        if system.histogram_bin_size == 0 {
            return Err(ConfigError::Invalid(
                "HISTOGRAM_BIN_SIZE must be nonzero".to_string(),
            ));
        }

        let t_refi = (device.refresh_period / device.tck).round() as u64;
        if t_refi == 0 {
            return Err(ConfigError::Invalid(
                "REFRESH_PERIOD shorter than one clock".to_string(),
            ));
        }

        let transaction_bytes = device.bl * system.jedec_data_bus_bits / 8;

        Ok(Config {
            num_chans: system.num_chans,
            num_ranks,
            num_banks: device.num_banks,
            num_rows: device.num_rows,
            num_cols: device.num_cols,
            device_width: device.device_width,
            jedec_data_bus_bits: system.jedec_data_bus_bits,
            megs_of_memory,
            tck: device.tck,
            cl: device.cl,
            al: device.al,
            cwl: device.cwl,
            bl: device.bl,
            trcd: device.trcd,
            trp: device.trp,
            tras: device.tras,
            trc: device.trc,
            trfc: device.trfc,
            tccd: device.tccd,
            trtp: device.trtp,
            twtr: device.twtr,
            twr: device.twr,
            trtrs: device.trtrs,
            trrd: device.trrd,
            tfaw: device.tfaw,
            tcke: device.tcke,
            txp: device.txp,
            idd0: device.idd0,
            idd2n: device.idd2n,
            idd2p: device.idd2p,
            idd3n: device.idd3n,
            idd4r: device.idd4r,
            idd4w: device.idd4w,
            idd5: device.idd5,
            vdd: device.vdd,
            row_buffer_policy: system.row_buffer_policy,
            address_mapping_scheme: system.address_mapping_scheme,
            scheduling_policy: system.scheduling_policy,
            queuing_structure: system.queuing_structure,
            trans_queue_depth: system.trans_queue_depth,
            cmd_queue_depth: system.cmd_queue_depth,
            epoch_length: system.epoch_length,
            use_low_power: system.use_low_power,
            store_data: system.store_data,
            vis_file_output: system.vis_file_output,
            verification_output: system.verification_output,
            log_output: system.log_output,
            histogram_bin_size: system.histogram_bin_size,
            read_latency: device.al + device.cl,
            write_latency: device.al + device.cwl,
            burst_cycles: device.bl / 2,
            transaction_bytes,
            t_refi,
            devices_per_rank,
            chan_bits: log2(system.num_chans),
            rank_bits: log2(num_ranks),
            bank_bits: log2(device.num_banks),
            row_bits: log2(device.num_rows),
            col_bits: log2(device.num_cols),
            byte_offset_bits: log2(transaction_bytes),
        })
    }

    /// DRAM clock frequency in Hz, from tCK in nanoseconds.
    pub fn dram_clk_hz(&self) -> u64 {
        (1.0 / (self.tck * 1e-9)) as u64
    }

    /// Cycles the bank must wait after a column read before a precharge.
    pub fn read_to_pre_delay(&self) -> u64 {
        self.al + self.burst_cycles + self.trtp.max(self.tccd) - self.tccd
    }

    /// Cycles the bank must wait after a column write before a precharge.
    pub fn write_to_pre_delay(&self) -> u64 {
        self.write_latency + self.burst_cycles + self.twr
    }
}
