// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use clap::Args;
use grb_core::{ChannelKey, DETECTOR_LABELS, NUM_DETECTORS, NUM_RANGES, filter_keys};
use grb_online::{FocusDesConfig, SingleCandidatePolicy};
use grb_trigger::{CorruptionPolicy, MuxConfig, Thresholds};

/// Detector settings that override the configuration file.
#[derive(Args, Clone, Debug, Default, PartialEq)]
pub struct DetectorOverrides {
    /// Detection threshold in standard deviations
    #[arg(long)]
    pub threshold: Option<f64>,
    /// DES level smoothing
    #[arg(long)]
    pub alpha: Option<f64>,
    /// DES slope smoothing
    #[arg(long)]
    pub beta: Option<f64>,
    /// Background delay and forecast horizon, in samples
    #[arg(long)]
    pub m: Option<usize>,
    /// Warm-up length, in samples
    #[arg(long)]
    pub sleep: Option<usize>,
    /// Maximum changepoint age rescanned by quality control
    #[arg(long)]
    pub t_max: Option<usize>,
    /// Minimum detectable rate ratio
    #[arg(long)]
    pub mu_min: Option<f64>,
    /// Initial background level
    #[arg(long = "s-0")]
    pub s_0: Option<f64>,
    /// Initial background slope
    #[arg(long = "b-0")]
    pub b_0: Option<f64>,
    /// Report the unrestricted maximum when quality control has nothing to rescan
    #[arg(long)]
    pub qc_report_global_max: bool,
}

impl DetectorOverrides {
    pub fn apply(&self, config: &mut FocusDesConfig) {
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(beta) = self.beta {
            config.beta = beta;
        }
        if let Some(m) = self.m {
            config.m = m;
        }
        if self.sleep.is_some() {
            config.sleep = self.sleep;
        }
        if self.t_max.is_some() {
            config.t_max = self.t_max;
        }
        if let Some(mu_min) = self.mu_min {
            config.mu_min = mu_min;
        }
        if self.s_0.is_some() {
            config.s_0 = self.s_0;
        }
        if self.b_0.is_some() {
            config.b_0 = self.b_0;
        }
        if self.qc_report_global_max {
            config.single_candidate_qc = SingleCandidatePolicy::ReportGlobalMax;
        }
    }
}

/// Multiplexer settings that override the configuration file.
#[derive(Args, Clone, Debug, Default, PartialEq)]
pub struct MuxOverrides {
    /// Rows skipped after a trigger
    #[arg(long)]
    pub stride: Option<usize>,
    /// Fraction of the table skipped before scanning
    #[arg(long)]
    pub t_start: Option<f64>,
    /// Zero readings tolerated before a channel is reset
    #[arg(long)]
    pub max_consecutive_zeros: Option<usize>,
    /// Reset a channel with a corrupted background instead of aborting
    #[arg(long)]
    pub reset_corrupted: bool,
    /// Step channels in parallel (requires the rayon feature)
    #[arg(long)]
    pub parallel: bool,
    /// Only use these detectors (labels 0-9, a, b)
    #[arg(long, value_delimiter = ',', value_parser = parse_detector_id)]
    pub detectors: Option<Vec<u8>>,
    /// Only use these energy ranges (0-2)
    #[arg(long, value_delimiter = ',', value_parser = parse_range_id)]
    pub ranges: Option<Vec<u8>>,
}

impl MuxOverrides {
    pub fn apply(&self, config: &mut MuxConfig) {
        if let Some(stride) = self.stride {
            config.stride = stride;
        }
        if let Some(t_start) = self.t_start {
            config.t_start = t_start;
        }
        if let Some(max) = self.max_consecutive_zeros {
            config.max_consecutive_zeros = max;
        }
        if self.reset_corrupted {
            config.corruption_policy = CorruptionPolicy::ResetChannel;
        }
        if self.parallel {
            config.parallel = true;
        }
    }

    /// Narrows `thresholds` to the selected detectors and ranges.
    pub fn select(&self, thresholds: Thresholds) -> Thresholds {
        if self.detectors.is_none() && self.ranges.is_none() {
            return thresholds;
        }
        let all_detectors: Vec<u8> = (0..NUM_DETECTORS as u8).collect();
        let detectors = self.detectors.as_deref().unwrap_or(&all_detectors);
        let keys: Vec<ChannelKey> =
            filter_keys(&thresholds.enabled_keys(), detectors, self.ranges.as_deref());
        thresholds.restricted_to(&keys)
    }
}

/// Accepts a detector label (`0`-`9`, `a`, `b`) or its decimal id.
pub fn parse_detector_id(raw: &str) -> Result<u8, String> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    if let (Some(c), None) = (chars.next(), chars.next())
        && let Some(pos) = DETECTOR_LABELS
            .iter()
            .position(|label| *label == c.to_ascii_lowercase())
    {
        return Ok(pos as u8);
    }
    match raw.parse::<u8>() {
        Ok(id) if usize::from(id) < NUM_DETECTORS => Ok(id),
        _ => Err(format!("invalid detector '{raw}'; expected 0-9, a or b")),
    }
}

pub fn parse_range_id(raw: &str) -> Result<u8, String> {
    match raw.trim().parse::<u8>() {
        Ok(id) if usize::from(id) < NUM_RANGES => Ok(id),
        _ => Err(format!("invalid range '{raw}'; expected 0, 1 or 2")),
    }
}
