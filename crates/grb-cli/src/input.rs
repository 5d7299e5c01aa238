// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::CliError;
use grb_core::{ChannelKey, NDET, all_keys};
use grb_online::{CountFile, FocusDesConfig, parse_counts};
use grb_trigger::{MuxConfig, ObservationTable, Thresholds};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Detector and multiplexer settings loaded from a JSON file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub detector: FocusDesConfig,
    pub mux: MuxConfig,
}

pub fn read_to_string(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path)
        .map_err(|source| CliError::io(format!("failed to read '{}'", path.display()), source))
}

pub fn load_replay_config(path: &Path) -> Result<ReplayConfig, CliError> {
    let raw = read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| {
        CliError::json(format!("invalid config JSON in '{}'", path.display()), source)
    })
}

pub fn load_thresholds(path: &Path) -> Result<Thresholds, CliError> {
    let raw = read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| {
        CliError::json(format!("invalid thresholds JSON in '{}'", path.display()), source)
    })?;
    parse_thresholds(&value)
}

/// Thresholds from either an array of 36 entries in key order or an object
/// keyed by channel name; `null` and missing keys disable a channel.
pub fn parse_thresholds(value: &Value) -> Result<Thresholds, CliError> {
    let mut slots: Vec<Option<f64>> = vec![None; NDET];
    match value {
        Value::Array(items) => {
            if items.len() != NDET {
                return Err(CliError::invalid_input(format!(
                    "thresholds array must have {NDET} entries; got {}",
                    items.len()
                )));
            }
            for (slot, item) in slots.iter_mut().zip(items) {
                *slot = threshold_entry(item, "thresholds array")?;
            }
        }
        Value::Object(map) => {
            for (name, item) in map {
                let key: ChannelKey = name.parse()?;
                slots[key.index()] = threshold_entry(item, name)?;
            }
        }
        _ => {
            return Err(CliError::invalid_input(
                "thresholds must be a JSON array or an object keyed by channel",
            ));
        }
    }
    Ok(Thresholds::from_options(&slots)?)
}

fn threshold_entry(item: &Value, context: &str) -> Result<Option<f64>, CliError> {
    match item {
        Value::Null => Ok(None),
        Value::Number(number) => number.as_f64().map(Some).ok_or_else(|| {
            CliError::invalid_input(format!("{context}: threshold {number} is not representable"))
        }),
        other => Err(CliError::invalid_input(format!(
            "{context}: threshold must be a number or null; got {other}"
        ))),
    }
}

pub fn load_table(path: &Path) -> Result<ObservationTable, CliError> {
    let raw = read_to_string(path)?;
    parse_table_csv(&raw)
}

struct TableLayout {
    met: usize,
    fault: usize,
    // column index for each channel, in key order
    channels: [usize; NDET],
    width: usize,
}

fn table_layout(header: &str) -> Result<TableLayout, CliError> {
    let cells = header.split(',').map(str::trim).collect::<Vec<_>>();
    let find = |names: &[&str]| {
        cells
            .iter()
            .position(|cell| names.iter().any(|name| cell.eq_ignore_ascii_case(name)))
    };
    let met = find(&["MET"])
        .ok_or_else(|| CliError::invalid_input("table header has no MET column"))?;
    let fault = find(&["SAA", "FAULT"])
        .ok_or_else(|| CliError::invalid_input("table header has no SAA/FAULT column"))?;

    let mut channels = [usize::MAX; NDET];
    for (col, cell) in cells.iter().enumerate() {
        if let Ok(key) = cell.parse::<ChannelKey>() {
            channels[key.index()] = col;
        }
    }
    let missing = all_keys()
        .iter()
        .filter(|key| channels[key.index()] == usize::MAX)
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(CliError::invalid_input(format!(
            "table header is missing channel columns: {}",
            missing.join(", ")
        )));
    }

    Ok(TableLayout {
        met,
        fault,
        channels,
        width: cells.len(),
    })
}

fn parse_fault(cell: &str) -> Option<bool> {
    match cell.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Some(true),
        "0" | "0.0" | "false" => Some(false),
        _ => None,
    }
}

fn parse_count(cell: &str) -> Option<u64> {
    if let Ok(count) = cell.parse::<u64>() {
        return Some(count);
    }
    // integral floats, as written by dataframe exports
    let value = cell.parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64)
        .then_some(value as u64)
}

/// Parses an observation table CSV: a header naming `MET`, a fault column
/// (`SAA` or `FAULT`) and the 36 channel columns in any order.
pub fn parse_table_csv(raw: &str) -> Result<ObservationTable, CliError> {
    let mut rows = raw.lines().map(str::trim).filter(|line| !line.is_empty());
    let header = rows
        .next()
        .ok_or_else(|| CliError::invalid_input("table CSV is empty"))?;
    let layout = table_layout(header)?;

    let mut table = ObservationTable::default();
    for (row_idx, row) in rows.enumerate() {
        let line = row_idx + 2;
        let cells = row.split(',').map(str::trim).collect::<Vec<_>>();
        if cells.len() != layout.width {
            return Err(CliError::invalid_input(format!(
                "table line {line} has {} columns but the header has {}",
                cells.len(),
                layout.width
            )));
        }

        let met = cells[layout.met].parse::<f64>().map_err(|_| {
            CliError::invalid_input(format!(
                "table line {line}: MET is not a valid float: '{}'",
                cells[layout.met]
            ))
        })?;
        let fault = parse_fault(cells[layout.fault]).ok_or_else(|| {
            CliError::invalid_input(format!(
                "table line {line}: fault flag must be 0/1/true/false; got '{}'",
                cells[layout.fault]
            ))
        })?;
        let mut counts = [0u64; NDET];
        for (slot, &col) in counts.iter_mut().zip(&layout.channels) {
            *slot = parse_count(cells[col]).ok_or_else(|| {
                CliError::invalid_input(format!(
                    "table line {line} column {}: expected a nonnegative integer count; got '{}'",
                    col + 1,
                    cells[col]
                ))
            })?;
        }
        table.push_row(met, fault, counts)?;
    }
    Ok(table)
}

pub fn load_counts(path: &Path) -> Result<CountFile, CliError> {
    let raw = read_to_string(path)?;
    Ok(parse_counts(&raw)?)
}
