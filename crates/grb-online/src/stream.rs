// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::focus_des::{FocusDesConfig, FocusDesDetector};
use grb_core::{ChannelDetector, GrbError};

/// Result of running one detector over a finite count stream.
///
/// On detection `trigger_index` is the index of the sample that raised it and
/// `changepoint` the first sample of the detected excess. Without detection
/// `significance` is zero, `changepoint` is the stream length and
/// `trigger_index` the last index.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamOutcome {
    pub significance: f64,
    pub changepoint: usize,
    pub trigger_index: usize,
}

impl StreamOutcome {
    pub fn detected(&self) -> bool {
        self.significance > 0.0
    }
}

/// Runs a fresh FOCuS-DES detector over `counts` until the first detection.
pub fn run_stream<I>(config: &FocusDesConfig, counts: I) -> Result<StreamOutcome, GrbError>
where
    I: IntoIterator<Item = u64>,
{
    let mut detector = FocusDesDetector::new(config.clone())?;
    run_detector(&mut detector, counts)
}

/// Feeds `counts` into `detector` and stops at the first positive significance.
pub fn run_detector<D, I>(detector: &mut D, counts: I) -> Result<StreamOutcome, GrbError>
where
    D: ChannelDetector + ?Sized,
    I: IntoIterator<Item = u64>,
{
    let mut len = 0usize;
    for (index, x) in counts.into_iter().enumerate() {
        len = index + 1;
        let detection = detector.step(x)?;
        if detection.is_positive() {
            return Ok(StreamOutcome {
                significance: detection.significance,
                changepoint: (index + 1).saturating_sub(detection.offset),
                trigger_index: index,
            });
        }
    }
    Ok(StreamOutcome {
        significance: 0.0,
        changepoint: len,
        trigger_index: len.saturating_sub(1),
    })
}

/// Parsed count file: one count per line, `#` lines are comments.
///
/// A leading `#<rate>` header, as written by the synthetic data generator,
/// is kept as the declared background rate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CountFile {
    pub declared_rate: Option<f64>,
    pub counts: Vec<u64>,
}

pub fn parse_counts(raw: &str) -> Result<CountFile, GrbError> {
    let mut out = CountFile::default();
    let mut seen_data = false;
    for (line_idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            if !seen_data && out.declared_rate.is_none() {
                out.declared_rate = comment.trim().parse::<f64>().ok();
            }
            continue;
        }
        let count = line.parse::<u64>().map_err(|err| {
            GrbError::invalid_input(format!(
                "line {}: expected a nonnegative integer count, got '{line}': {err}",
                line_idx + 1
            ))
        })?;
        seen_data = true;
        out.counts.push(count);
    }
    Ok(out)
}
