// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use grb_cli::{
    CliError, DetectorOverrides, MuxOverrides, ReplayConfig, ReplayOutput, StderrProgress,
    StreamOutput, emit_structured_error, load_counts, load_replay_config, load_table,
    load_thresholds, write_json_output,
};
use grb_core::ExecutionContext;
use grb_online::run_stream;
use grb_trigger::{Thresholds, TriggerMux};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grb")]
#[command(about = "Real-time gamma-ray burst trigger replay over detector count data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the multi-channel trigger over an observation table
    Replay(ReplayArgs),
    /// Run a single detector over a stream of counts
    Stream(StreamArgs),
}

#[derive(clap::Args)]
struct ReplayArgs {
    /// Observation table CSV (MET, SAA/FAULT and one column per channel)
    #[arg(long)]
    table: PathBuf,
    /// Per-channel thresholds JSON; defaults to the detector threshold everywhere
    #[arg(long)]
    thresholds: Option<PathBuf>,
    /// Detector and multiplexer configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    detector: DetectorOverrides,
    #[command(flatten)]
    mux: MuxOverrides,
    /// Print scan progress on stderr
    #[arg(long)]
    progress: bool,
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
struct StreamArgs {
    /// Count file, one count per line; `#` lines are ignored
    #[arg(long)]
    input: PathBuf,
    /// Detector configuration JSON (same layout as for `replay`)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    detector: DetectorOverrides,
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Replay(args) => handle_replay(args),
        Command::Stream(args) => handle_stream(args),
    };
    if let Err(err) = result {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ReplayConfig, CliError> {
    match path {
        Some(path) => load_replay_config(path),
        None => Ok(ReplayConfig::default()),
    }
}

fn handle_replay(args: ReplayArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_ref())?;
    args.detector.apply(&mut config.detector);
    args.mux.apply(&mut config.mux);

    let thresholds = match &args.thresholds {
        Some(path) => load_thresholds(path)?,
        None => Thresholds::uniform(config.detector.threshold)?,
    };
    let thresholds = args.mux.select(thresholds);

    let table = load_table(&args.table)?;
    tracing::info!(
        table = %args.table.display(),
        rows = table.len(),
        channels = thresholds.enabled_keys().len(),
        "starting replay"
    );

    let progress = StderrProgress::new();
    let ctx = if args.progress {
        ExecutionContext::new().with_progress_sink(&progress)
    } else {
        ExecutionContext::new()
    };

    let mut mux = TriggerMux::focus_des(config.mux, thresholds, config.detector)?;
    let enabled = mux.channels().len();
    mux.run(&table, &ctx)?;
    progress.finish();

    let report = mux.into_report();
    tracing::info!(
        triggers = report.triggers.len(),
        resets = report.resets.len(),
        "replay finished"
    );
    let output = ReplayOutput::new(&args.table, table.len(), enabled, report);
    write_json_output(&output, args.output.as_deref())
}

fn handle_stream(args: StreamArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_ref())?;
    args.detector.apply(&mut config.detector);

    let counts = load_counts(&args.input)?;
    let samples = counts.counts.len();
    let outcome = run_stream(&config.detector, counts.counts)?;
    if outcome.detected() {
        tracing::info!(
            significance = outcome.significance,
            changepoint = outcome.changepoint,
            trigger_index = outcome.trigger_index,
            "detection"
        );
    }

    let output = StreamOutput {
        input: args.input.display().to_string(),
        samples,
        declared_rate: counts.declared_rate,
        outcome,
    };
    write_json_output(&output, args.output.as_deref())
}
