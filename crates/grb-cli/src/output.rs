// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::CliError;
use grb_core::{ProgressSink, progress_percent};
use grb_online::StreamOutcome;
use grb_trigger::{ReplayReport, ResetEvent, TriggerEvent};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Serialize)]
pub struct ReplayOutput {
    pub table: String,
    pub rows: usize,
    pub enabled_channels: usize,
    pub triggers: Vec<TriggerEvent>,
    pub resets: Vec<ResetEvent>,
}

impl ReplayOutput {
    pub fn new(table: &Path, rows: usize, enabled_channels: usize, report: ReplayReport) -> Self {
        Self {
            table: table.display().to_string(),
            rows,
            enabled_channels,
            triggers: report.triggers,
            resets: report.resets,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StreamOutput {
    pub input: String,
    pub samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_rate: Option<f64>,
    #[serde(flatten)]
    pub outcome: StreamOutcome,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

pub fn write_json_output<T: Serialize>(
    payload: &T,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(payload)
        .map_err(|source| CliError::json("failed to serialize JSON output", source))?;

    if let Some(path) = output_path {
        fs::write(path, format!("{encoded}\n"))
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source))
    } else {
        println!("{encoded}");
        Ok(())
    }
}

pub fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}

/// Prints a percentage on stderr whenever the whole-percent value changes.
#[derive(Debug)]
pub struct StderrProgress {
    last_percent: AtomicUsize,
}

impl StderrProgress {
    pub fn new() -> Self {
        Self {
            last_percent: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn finish(&self) {
        if self.last_percent.load(Ordering::Relaxed) != usize::MAX {
            eprintln!();
        }
    }
}

impl Default for StderrProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for StderrProgress {
    fn on_progress(&self, row: usize, total_rows: usize) {
        let percent = progress_percent(row, total_rows);
        let whole = percent as usize;
        if self.last_percent.swap(whole, Ordering::Relaxed) != whole {
            eprint!("\r{percent:6.2} %");
        }
    }
}
