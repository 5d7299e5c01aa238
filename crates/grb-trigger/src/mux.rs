// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::table::{ObservationTable, Thresholds};
use grb_core::{
    ChannelDetector, ChannelKey, Detection, ExecutionContext, GrbError, NDET, progress_percent,
};
use grb_online::{FocusDesConfig, FocusDesDetector};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::collections::BTreeSet;

/// What the multiplexer does when a channel detector fails to step.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CorruptionPolicy {
    /// Stop the replay with [`GrbError::CorruptedBackground`].
    #[default]
    Abort,
    /// Reset the failing channel, log it and keep going.
    ResetChannel,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct MuxConfig {
    /// Rows skipped after a trigger, at least 1.
    pub stride: usize,
    /// Fraction of the table to skip before scanning, in `[0, 1]`.
    pub t_start: f64,
    /// A channel reading zero for more than this many consecutive rows is
    /// reset.
    pub max_consecutive_zeros: usize,
    pub corruption_policy: CorruptionPolicy,
    /// Step channels on the rayon pool; requires the `rayon` feature.
    pub parallel: bool,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            stride: 1,
            t_start: 0.0,
            max_consecutive_zeros: 10,
            corruption_policy: CorruptionPolicy::Abort,
            parallel: false,
        }
    }
}

impl MuxConfig {
    pub fn validate(&self) -> Result<(), GrbError> {
        if self.stride < 1 {
            return Err(GrbError::invalid_input("stride must be >= 1"));
        }
        if !self.t_start.is_finite() || !(0.0..=1.0).contains(&self.t_start) {
            return Err(GrbError::invalid_input(format!(
                "t_start must be finite and in [0,1]; got {}",
                self.t_start
            )));
        }
        if self.parallel && !cfg!(feature = "rayon") {
            return Err(GrbError::invalid_input(
                "parallel channel stepping requires the rayon feature",
            ));
        }
        Ok(())
    }

    /// First row scanned for a table of `nrows` rows.
    pub fn start_index(&self, nrows: usize) -> usize {
        ((self.t_start * nrows as f64).floor() as usize).min(nrows)
    }
}

/// A channel over threshold when a trigger fired.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelHit {
    pub key: ChannelKey,
    /// Changepoint position relative to the trigger row (`-offset`).
    pub offset: i64,
    pub significance: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerEvent {
    pub id: usize,
    pub met: f64,
    pub index: usize,
    pub hits: Vec<ChannelHit>,
}

impl TriggerEvent {
    /// Distinct detectors among the hits.
    pub fn detectors(&self) -> BTreeSet<u8> {
        self.hits.iter().map(|hit| hit.key.detector()).collect()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetCause {
    /// Fault flag raised; `resume` is the row where it clears.
    FaultFlag { resume: Option<usize> },
    /// Every channel read zero; `resume` is the next row with signal.
    Outage { resume: Option<usize> },
    StaleChannel(ChannelKey),
    /// Reset following the trigger with this id.
    Trigger(usize),
    CorruptedBackground(ChannelKey),
}

impl ResetCause {
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Self::FaultFlag { .. } | Self::Outage { .. } | Self::Trigger(_)
        )
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResetEvent {
    pub index: usize,
    pub met: f64,
    pub cause: ResetCause,
}

/// Everything a replay produced.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayReport {
    pub triggers: Vec<TriggerEvent>,
    pub resets: Vec<ResetEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChannelTick {
    Stepped,
    Stale,
}

/// Detector and bookkeeping for one enabled channel.
#[derive(Clone, Debug)]
pub struct ChannelState<D> {
    key: ChannelKey,
    detector: D,
    consecutive_zeros: usize,
    last: Detection,
}

impl<D: ChannelDetector> ChannelState<D> {
    fn new(key: ChannelKey, detector: D) -> Self {
        Self {
            key,
            detector,
            consecutive_zeros: 0,
            last: Detection::NONE,
        }
    }

    pub fn key(&self) -> ChannelKey {
        self.key
    }

    /// Detection recorded on the most recent row.
    pub fn last_detection(&self) -> Detection {
        self.last
    }

    pub fn consecutive_zeros(&self) -> usize {
        self.consecutive_zeros
    }

    fn reset(&mut self) {
        self.detector.reset();
        self.consecutive_zeros = 0;
        self.last = Detection::NONE;
    }

    fn tick(&mut self, x: u64, max_consecutive_zeros: usize) -> Result<ChannelTick, GrbError> {
        if x == 0 {
            self.consecutive_zeros += 1;
        } else {
            self.consecutive_zeros = 0;
        }
        if self.consecutive_zeros > max_consecutive_zeros {
            self.reset();
            return Ok(ChannelTick::Stale);
        }
        // a failed step records nothing
        self.last = Detection::NONE;
        self.last = self.detector.step(x)?;
        Ok(ChannelTick::Stepped)
    }
}

fn tick_sequential<D: ChannelDetector>(
    channels: &mut [ChannelState<D>],
    counts: &[u64; NDET],
    max_consecutive_zeros: usize,
) -> Vec<Result<ChannelTick, GrbError>> {
    channels
        .iter_mut()
        .map(|channel| channel.tick(counts[channel.key.index()], max_consecutive_zeros))
        .collect()
}

#[cfg(feature = "rayon")]
fn tick_all<D: ChannelDetector>(
    channels: &mut [ChannelState<D>],
    counts: &[u64; NDET],
    max_consecutive_zeros: usize,
    parallel: bool,
) -> Vec<Result<ChannelTick, GrbError>> {
    if !parallel {
        return tick_sequential(channels, counts, max_consecutive_zeros);
    }
    // Collecting is the barrier: every channel has stepped before coincidence.
    channels
        .par_iter_mut()
        .map(|channel| channel.tick(counts[channel.key.index()], max_consecutive_zeros))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn tick_all<D: ChannelDetector>(
    channels: &mut [ChannelState<D>],
    counts: &[u64; NDET],
    max_consecutive_zeros: usize,
    _parallel: bool,
) -> Vec<Result<ChannelTick, GrbError>> {
    tick_sequential(channels, counts, max_consecutive_zeros)
}

/// True when the hits come from at least two distinct detectors.
pub fn is_coincident(hits: &[ChannelHit]) -> bool {
    let mut detectors = hits.iter().map(|hit| hit.key.detector());
    match detectors.next() {
        Some(first) => detectors.any(|det| det != first),
        None => false,
    }
}

/// Runs one detector per enabled channel over an observation table and
/// collects coincidence-gated triggers.
#[derive(Clone, Debug)]
pub struct TriggerMux<D> {
    config: MuxConfig,
    thresholds: Thresholds,
    channels: Vec<ChannelState<D>>,
    triggers: Vec<TriggerEvent>,
    resets: Vec<ResetEvent>,
}

impl<D: ChannelDetector> TriggerMux<D> {
    /// Builds one detector per enabled channel through `factory`.
    pub fn new<F>(config: MuxConfig, thresholds: Thresholds, factory: F) -> Result<Self, GrbError>
    where
        F: Fn() -> D,
    {
        config.validate()?;
        let channels = thresholds
            .enabled_keys()
            .into_iter()
            .map(|key| ChannelState::new(key, factory()))
            .collect();
        Ok(Self {
            config,
            thresholds,
            channels,
            triggers: Vec::new(),
            resets: Vec::new(),
        })
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Enabled channels in key order.
    pub fn channels(&self) -> &[ChannelState<D>] {
        &self.channels
    }

    pub fn triggers(&self) -> &[TriggerEvent] {
        &self.triggers
    }

    pub fn resets(&self) -> &[ResetEvent] {
        &self.resets
    }

    pub fn into_report(self) -> ReplayReport {
        ReplayReport {
            triggers: self.triggers,
            resets: self.resets,
        }
    }

    /// Replays `table` from the configured start row and returns the trigger
    /// registry. Every call starts from freshly reset channels.
    pub fn run(
        &mut self,
        table: &ObservationTable,
        ctx: &ExecutionContext<'_>,
    ) -> Result<&[TriggerEvent], GrbError> {
        self.reset_channels();
        self.triggers.clear();
        self.resets.clear();

        let nrows = table.len();
        let mut t = self.config.start_index(nrows);
        while let Some(row) = table.row(t) {
            ctx.check_cancelled()?;
            ctx.report_progress(t, nrows);

            if row.fault {
                let resume = table.next_clear_fault(t);
                tracing::warn!(
                    met = row.met,
                    index = t,
                    ?resume,
                    "fault flag raised, resetting all channels"
                );
                self.reset_channels();
                self.resets.push(ResetEvent {
                    index: t,
                    met: row.met,
                    cause: ResetCause::FaultFlag { resume },
                });
                match resume {
                    Some(next) => {
                        t = next;
                        continue;
                    }
                    None => break,
                }
            }

            if row.is_silent() {
                let resume = table.next_active_row(t);
                tracing::warn!(
                    met = row.met,
                    index = t,
                    ?resume,
                    "all detectors read zero, resetting all channels"
                );
                self.reset_channels();
                self.resets.push(ResetEvent {
                    index: t,
                    met: row.met,
                    cause: ResetCause::Outage { resume },
                });
                match resume {
                    Some(next) => {
                        t = next;
                        continue;
                    }
                    None => break,
                }
            }

            let outcomes = tick_all(
                &mut self.channels,
                row.counts,
                self.config.max_consecutive_zeros,
                self.config.parallel,
            );
            for (pos, outcome) in outcomes.into_iter().enumerate() {
                let key = self.channels[pos].key;
                match outcome {
                    Ok(ChannelTick::Stepped) => {}
                    Ok(ChannelTick::Stale) => {
                        tracing::warn!(
                            channel = %key,
                            met = row.met,
                            index = t,
                            "channel stuck at zero, resetting it"
                        );
                        self.resets.push(ResetEvent {
                            index: t,
                            met: row.met,
                            cause: ResetCause::StaleChannel(key),
                        });
                    }
                    Err(err) => match self.config.corruption_policy {
                        CorruptionPolicy::Abort => {
                            return Err(GrbError::corrupted_background(
                                key.to_string(),
                                row.met,
                                t,
                                err.to_string(),
                            ));
                        }
                        CorruptionPolicy::ResetChannel => {
                            tracing::warn!(
                                channel = %key,
                                met = row.met,
                                index = t,
                                error = %err,
                                "corrupted background estimate, resetting channel"
                            );
                            self.channels[pos].reset();
                            self.resets.push(ResetEvent {
                                index: t,
                                met: row.met,
                                cause: ResetCause::CorruptedBackground(key),
                            });
                        }
                    },
                }
            }

            let hits = self.hits();
            if is_coincident(&hits) {
                let id = self.triggers.len();
                tracing::info!(
                    id,
                    met = row.met,
                    index = t,
                    done_pct = progress_percent(t, nrows),
                    channels = hits.len(),
                    "new trigger"
                );
                for hit in &hits {
                    tracing::info!(
                        id,
                        channel = %hit.key,
                        offset = hit.offset,
                        significance = hit.significance,
                        "trigger channel"
                    );
                }
                self.reset_channels();
                self.resets.push(ResetEvent {
                    index: t,
                    met: row.met,
                    cause: ResetCause::Trigger(id),
                });
                self.triggers.push(TriggerEvent {
                    id,
                    met: row.met,
                    index: t,
                    hits,
                });
                t += self.config.stride;
            } else {
                t += 1;
            }
        }

        Ok(&self.triggers)
    }

    fn hits(&self) -> Vec<ChannelHit> {
        self.channels
            .iter()
            .filter(|channel| channel.last.significance > self.thresholds.get(channel.key))
            .map(|channel| ChannelHit {
                key: channel.key,
                offset: -(channel.last.offset as i64),
                significance: channel.last.significance,
            })
            .collect()
    }

    fn reset_channels(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }
}

impl TriggerMux<FocusDesDetector> {
    /// Multiplexer running a FOCuS-DES detector on every enabled channel.
    pub fn focus_des(
        config: MuxConfig,
        thresholds: Thresholds,
        detector: FocusDesConfig,
    ) -> Result<Self, GrbError> {
        let template = FocusDesDetector::new(detector)?;
        Self::new(config, thresholds, || template.clone())
    }
}

/// Builds a multiplexer, replays `table` and returns what it produced.
pub fn trigger_mux<D, F>(
    table: &ObservationTable,
    thresholds: Thresholds,
    config: MuxConfig,
    factory: F,
    ctx: &ExecutionContext<'_>,
) -> Result<ReplayReport, GrbError>
where
    D: ChannelDetector,
    F: Fn() -> D,
{
    let mut mux = TriggerMux::new(config, thresholds, factory)?;
    mux.run(table, ctx)?;
    Ok(mux.into_report())
}
