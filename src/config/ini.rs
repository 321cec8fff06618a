//! Legacy INI reader.
//!
//! Device and system parameters live in flat `KEY=VALUE` files with `;` or
//! `#` comments and case-sensitive keys. The reader collects the key/value
//! pairs, applies command-line overrides at highest precedence, renders the
//! merged set as a TOML document, and hands it to the typed serde layer.

use super::{Config, ConfigError, DeviceParams, SystemParams};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Ordered key/value set from one or more INI sources.
pub type OptionsMap = BTreeMap<String, String>;

/// Reads a `KEY=VALUE` INI file into an options map.
///
/// Blank lines and lines starting with `;` or `#` are skipped; trailing
/// comments on a value line are stripped. A non-comment line without `=`
/// is a configuration fault, reported with its line number.
pub fn read_ini_file(path: &Path) -> Result<OptionsMap, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut map = OptionsMap::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Parse {
                source: path.display().to_string(),
                message: format!("line {}: expected KEY=VALUE, got '{}'", lineno + 1, raw),
            });
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

/// Splits a `KEY=VAL[,KEY=VAL...]` override string into an options map.
pub fn parse_overrides(kv_str: &str) -> Result<OptionsMap, ConfigError> {
    let mut map = OptionsMap::new();
    for piece in kv_str.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let Some((key, value)) = piece.split_once('=') else {
            return Err(ConfigError::Parse {
                source: "command-line overrides".to_string(),
                message: format!("expected KEY=VALUE, got '{}'", piece),
            });
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

fn strip_comment(line: &str) -> &str {
    match line.find([';', '#']) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Renders an options map as a TOML document, inferring value types.
///
/// Integers, floats, and booleans pass through bare; everything else is
/// quoted so enum-valued keys deserialize as strings.
pub fn to_toml(map: &OptionsMap) -> String {
    let mut doc = String::new();
    for (key, value) in map {
        if value.parse::<i64>().is_ok()
            || value.parse::<f64>().is_ok()
            || value == "true"
            || value == "false"
        {
            let _ = writeln!(doc, "{} = {}", key, value);
        } else {
            let _ = writeln!(doc, "{} = \"{}\"", key, value.replace('"', "\\\""));
        }
    }
    doc
}

/// Loads and resolves the full configuration from the two INI files plus
/// overrides.
///
/// Both parameter structs deserialize from the single merged document, so
/// a key may live in either file; overrides win over both. Override keys
/// that appear in neither file are still applied but reported, matching
/// the permissive behavior of the original option map.
pub fn load_config(
    device_path: &Path,
    system_path: &Path,
    overrides: &OptionsMap,
    megs_of_memory: u64,
    quiet: bool,
) -> Result<Config, ConfigError> {
    let device_map = read_ini_file(device_path)?;
    let system_map = read_ini_file(system_path)?;

    let mut merged = device_map.clone();
    merged.extend(system_map.clone());
    let mut unseen = 0usize;
    for (key, value) in overrides {
        if !merged.contains_key(key) {
            unseen += 1;
        }
        merged.insert(key.clone(), value.clone());
    }
    if !quiet && !overrides.is_empty() {
        println!(
            "[Config] applied {} overrides ({} named keys absent from the ini files)",
            overrides.len(),
            unseen
        );
    }

    let doc = to_toml(&merged);
    let device: DeviceParams = toml::from_str(&doc).map_err(|e| ConfigError::Parse {
        source: device_path.display().to_string(),
        message: e.message().to_string(),
    })?;
    let system: SystemParams = toml::from_str(&doc).map_err(|e| ConfigError::Parse {
        source: system_path.display().to_string(),
        message: e.message().to_string(),
    })?;

    Config::resolve(device, system, megs_of_memory)
}
