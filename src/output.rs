//! File sinks for simulation output.
//!
//! Three artifacts can be produced per run: the vis CSV of per-epoch
//! statistics, an optional dump of every issued bus command for regression
//! comparison, and an optional run log. Directory layout and the
//! `SIM_DESC` suffixing follow the historical results tree so existing
//! tooling keeps working.

use crate::config::Config;
use crate::mem::command::BusCommand;
use crate::stats::StatSink;
use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// The `SIM_DESC` environment variable, when set and nonempty.
pub fn sim_description() -> Option<String> {
    env::var("SIM_DESC").ok().filter(|s| !s.is_empty())
}

/// Appends `.<SIM_DESC>` to a name when the variable is set.
fn with_sim_desc(base: &str) -> String {
    match sim_description() {
        Some(desc) => format!("{}.{}", base, desc),
        None => base.to_string(),
    }
}

/// Finds the first free `<base>[.N]<ext>` name, probing N = 1..=max.
///
/// Falls back to the plain name with a warning when every suffix is taken.
pub fn filename_with_number_suffix(base: &str, ext: &str, max: u32) -> String {
    let plain = format!("{}{}", base, ext);
    if !Path::new(&plain).exists() {
        return plain;
    }
    for i in 1..=max {
        let candidate = format!("{}.{}{}", base, i, ext);
        if !Path::new(&candidate).exists() {
            return candidate;
        }
    }
    eprintln!("[Output] no free suffix for '{}', overwriting", plain);
    plain
}

/// Builds `PWD/results/<trace>[.<SIM_DESC>]/<device>/<params>.vis` and
/// creates the directories.
pub fn vis_file_path(
    pwd: &str,
    trace_name: &str,
    device_ini: &Path,
    cfg: &Config,
) -> std::io::Result<PathBuf> {
    let trace_base = Path::new(trace_name)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".to_string());
    let device_base = device_ini
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "device".to_string());

    let mut dir = if pwd.is_empty() {
        PathBuf::from("results")
    } else {
        Path::new(pwd).join("results")
    };
    dir.push(with_sim_desc(&trace_base));
    dir.push(device_base);
    fs::create_dir_all(&dir)?;

    let params = format!(
        "{}MB.{}ch.{}r.{}.{}.{}.vis",
        cfg.megs_of_memory,
        cfg.num_chans,
        cfg.num_ranks,
        cfg.address_mapping_scheme,
        cfg.row_buffer_policy,
        cfg.queuing_structure
    );
    Ok(dir.join(params))
}

/// CSV writer for per-epoch statistics.
///
/// Column names are learned from the first row; the header is emitted once
/// when that row ends, and later rows must present the same column count.
pub struct VisWriter {
    writer: BufWriter<File>,
    names: Vec<String>,
    values: Vec<f64>,
    header_written: bool,
}

impl VisWriter {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            names: Vec::new(),
            values: Vec::new(),
            header_written: false,
        })
    }

    /// Flushes buffered rows to disk.
    pub fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl StatSink for VisWriter {
    fn record(&mut self, name: &str, value: f64) {
        if !self.header_written {
            self.names.push(name.to_string());
        }
        self.values.push(value);
    }

    fn end_row(&mut self) {
        if !self.header_written {
            let _ = writeln!(self.writer, "{}", self.names.join(","));
            self.header_written = true;
        }
        assert_eq!(
            self.values.len(),
            self.names.len(),
            "vis row width changed between epochs"
        );
        let row: Vec<String> = self.values.iter().map(|v| format!("{:.6}", v)).collect();
        let _ = writeln!(self.writer, "{}", row.join(","));
        self.values.clear();
    }
}

/// Verification dump: one line per issued bus command.
pub struct CommandLog {
    writer: BufWriter<File>,
}

impl CommandLog {
    /// Opens `sim_out_<device>[.<SIM_DESC>].tmp` in the working directory.
    pub fn create_for_device(device_ini: &Path) -> std::io::Result<Self> {
        let device_base = device_ini
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "device".to_string());
        let name = format!("{}.tmp", with_sim_desc(&format!("sim_out_{}", device_base)));
        Ok(Self {
            writer: BufWriter::new(File::create(name)?),
        })
    }

    pub fn log(&mut self, cycle: u64, channel: usize, cmd: &BusCommand) {
        let _ = writeln!(self.writer, "{} ch{} {}", cycle, channel, cmd);
    }

    pub fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Plain-text run log, `dramsim[.<SIM_DESC>][.N].log`.
pub struct SimLog {
    writer: BufWriter<File>,
}

impl SimLog {
    pub fn create() -> std::io::Result<Self> {
        let name = filename_with_number_suffix(&with_sim_desc("dramsim"), ".log", 100);
        Ok(Self {
            writer: BufWriter::new(File::create(name)?),
        })
    }

    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.writer, "{}", text);
    }

    pub fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}
