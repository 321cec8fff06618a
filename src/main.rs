//! DRAM Simulator CLI.
//!
//! Trace-driven front end for the memory-system core. It parses command
//! line arguments, loads the device and system INI files, builds the
//! multi-channel memory system, and runs one of two loops:
//!
//! 1. **Cycle-driven** (default): simulate exactly `--numcycles` host
//!    cycles, issuing trace lines as their scheduled cycles arrive.
//! 2. **KISS** (`-k`): consume the whole three-integer trace, throttling
//!    on backpressure, and run until every transaction has returned.

use clap::Parser;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use dramsim::config::ini;
use dramsim::mem::system::MemorySystem;
use dramsim::sim::driver::{self, DriverState};
use dramsim::sim::trace;

/// Command-line arguments for the trace-driven simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "Cycle-accurate DRAM memory-system simulator")]
struct Args {
    /// Trace file to run.
    #[arg(short = 't', long = "tracefile")]
    tracefile: String,

    /// System-level INI file.
    #[arg(short = 's', long = "systemini", default_value = "system.ini")]
    systemini: String,

    /// Device-level INI file.
    #[arg(short = 'd', long = "deviceini")]
    deviceini: String,

    /// Number of host cycles to simulate (cycle-driven mode).
    #[arg(short = 'c', long = "numcycles", default_value_t = 30)]
    numcycles: u64,

    /// Suppress simulation output except final stats.
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Override INI options, e.g. -o tRC=14,tFAW=19.
    #[arg(short = 'o', long = "option")]
    option: Option<String>,

    /// Working directory holding ini/ and results/.
    #[arg(short = 'p', long = "pwd", default_value = "")]
    pwd: String,

    /// Memory system size in megabytes.
    #[arg(short = 'S', long = "size", default_value_t = 2048)]
    size: u64,

    /// Ignore the clock-cycle column of the trace file.
    #[arg(short = 'n', long = "notiming")]
    notiming: bool,

    /// Vis output filename (overrides the results-tree path).
    #[arg(short = 'v', long = "visfile")]
    visfile: Option<String>,

    /// Treat the trace as KISS format and run the simple loop.
    #[arg(short = 'k', long = "keep_simple")]
    keep_simple: bool,

    /// Stop after this many accepted transactions (0 = unlimited).
    #[arg(short = 'e', long = "end_trans", default_value_t = 0)]
    end_trans: u64,
}

fn main() {
    let args = Args::parse();

    let overrides = match args.option.as_deref().map(ini::parse_overrides) {
        Some(Ok(map)) => map,
        Some(Err(e)) => {
            eprintln!("[!] {}", e);
            process::exit(1);
        }
        None => Default::default(),
    };

    let trace_path = resolve_trace_path(&args.pwd, &args.tracefile);

    let mut system = match MemorySystem::new(
        &args.deviceini,
        &args.systemini,
        &args.pwd,
        &args.tracefile,
        args.size,
        &overrides,
        args.visfile.as_deref(),
        args.quiet,
    ) {
        Ok(system) => system,
        Err(e) => {
            eprintln!("[!] {}", e);
            process::exit(1);
        }
    };
    // The trace driver runs the host clock at the DRAM clock.
    system.set_cpu_clock_speed(0);

    if !args.quiet {
        let cfg = system.config();
        println!("Memory System Configuration");
        println!("---------------------------");
        println!("  Size:               {} MB", cfg.megs_of_memory);
        println!(
            "  Topology:           {} channels x {} ranks x {} banks",
            cfg.num_chans, cfg.num_ranks, cfg.num_banks
        );
        println!("  Rows x Cols:        {} x {}", cfg.num_rows, cfg.num_cols);
        println!(
            "  Device:             x{} @ tCK {} ns, CL {}, BL {}",
            cfg.device_width, cfg.tck, cfg.cl, cfg.bl
        );
        println!("  Row policy:         {}", cfg.row_buffer_policy);
        println!("  Address mapping:    {}", cfg.address_mapping_scheme);
        println!("  Queue structure:    {}", cfg.queuing_structure);
        println!("---------------------------");
        println!("[*] Trace: {}", trace_path.display());
    }

    let state = Rc::new(RefCell::new(DriverState::new(args.quiet)));
    driver::register_driver_callbacks(&mut system, state.clone());

    let result = if args.keep_simple {
        driver::run_kiss(&mut system, &state, &trace_path, args.end_trans)
    } else {
        match trace::detect_format(&trace_path) {
            Ok(format) => driver::run_cycle_driven(
                &mut system,
                &state,
                &trace_path,
                format,
                args.numcycles,
                !args.notiming,
                args.end_trans,
            ),
            Err(e) => {
                eprintln!("[!] {}", e);
                process::exit(1);
            }
        }
    };

    if let Err(e) = result {
        eprintln!("[!] {}", e);
        process::exit(1);
    }

    system.simulation_done();
}

fn resolve_trace_path(pwd: &str, trace: &str) -> PathBuf {
    if pwd.is_empty() || trace.starts_with('/') {
        PathBuf::from(trace)
    } else {
        Path::new(pwd).join(trace)
    }
}
