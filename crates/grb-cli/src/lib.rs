// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod args;
pub mod error;
pub mod input;
pub mod output;

pub use args::{DetectorOverrides, MuxOverrides};
pub use error::CliError;
pub use input::{
    ReplayConfig, load_counts, load_replay_config, load_table, load_thresholds, parse_table_csv,
    parse_thresholds,
};
pub use output::{
    ReplayOutput, StderrProgress, StreamOutput, emit_structured_error, write_json_output,
};
