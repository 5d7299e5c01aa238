// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::des::{DesParams, ForecastState};
use crate::focus::PoissonFocus;
use grb_core::{ChannelDetector, Detection, GrbError};
use std::collections::VecDeque;

/// What quality control reports when no candidate besides the head is left
/// to rescan.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SingleCandidatePolicy {
    /// Suppress the detection for this step.
    #[default]
    ReportZero,
    /// Fall back to the engine's unrestricted maximum.
    ReportGlobalMax,
}

/// Configuration for [`FocusDesDetector`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct FocusDesConfig {
    /// Detection threshold in standard-deviation units.
    pub threshold: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Background delay and forecast horizon, in steps.
    pub m: usize,
    /// Maximum changepoint age rescanned by quality control; `None` disables
    /// the rescan.
    pub t_max: Option<usize>,
    pub mu_min: f64,
    /// Warm-up length. Defaults to `m` when `s_0` is given.
    pub sleep: Option<usize>,
    /// Initial background level; otherwise the mean of the first
    /// `sleep - m` samples.
    pub s_0: Option<f64>,
    /// Initial background slope; otherwise flat.
    pub b_0: Option<f64>,
    pub single_candidate_qc: SingleCandidatePolicy,
}

impl Default for FocusDesConfig {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            alpha: 0.005,
            beta: 0.0001,
            m: 20,
            t_max: None,
            mu_min: 1.0,
            sleep: Some(200),
            s_0: None,
            b_0: None,
            single_candidate_qc: SingleCandidatePolicy::ReportZero,
        }
    }
}

impl FocusDesConfig {
    pub fn validate(&self) -> Result<(), GrbError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(GrbError::invalid_input(format!(
                "threshold must be finite and > 0; got {}",
                self.threshold
            )));
        }
        DesParams::new(self.alpha, self.beta)?;
        if !self.mu_min.is_finite() || self.mu_min < 1.0 {
            return Err(GrbError::invalid_input(format!(
                "mu_min must be finite and >= 1; got {}",
                self.mu_min
            )));
        }

        if let Some(sleep) = self.sleep
            && sleep <= self.m
        {
            return Err(GrbError::invalid_input(format!(
                "sleep must be > m; got sleep={sleep}, m={}",
                self.m
            )));
        }

        match self.s_0 {
            Some(s_0) if !s_0.is_finite() || s_0 <= 0.0 => {
                return Err(GrbError::invalid_input(format!(
                    "s_0 must be finite and > 0; got {s_0}"
                )));
            }
            None if self.sleep.is_none() => {
                return Err(GrbError::invalid_input(
                    "either sleep or s_0 must be given to initialize the background",
                ));
            }
            _ => {}
        }

        if let Some(b_0) = self.b_0
            && (!b_0.is_finite() || b_0 < 0.0)
        {
            return Err(GrbError::invalid_input(format!(
                "b_0 must be finite and >= 0; got {b_0}"
            )));
        }

        Ok(())
    }

    /// Warm-up length actually used.
    pub fn effective_sleep(&self) -> usize {
        self.sleep.unwrap_or(self.m)
    }
}

/// Poisson-FOCuS over a delayed double-exponential-smoothing background.
///
/// The first `sleep` steps only fill the delay buffer. On the step whose
/// zero-based index equals `sleep` the background is initialized, the
/// `sleep - m` oldest samples are dropped and normal processing starts, so
/// every later step feeds the background with the sample observed exactly
/// `m` steps earlier.
#[derive(Clone, Debug)]
pub struct FocusDesDetector {
    config: FocusDesConfig,
    params: DesParams,
    sleep: usize,
    engine: PoissonFocus,
    buffer: VecDeque<u64>,
    // None until warm-up completes.
    background: Option<ForecastState>,
    next_t: usize,
}

impl FocusDesDetector {
    pub fn new(config: FocusDesConfig) -> Result<Self, GrbError> {
        config.validate()?;
        let params = DesParams {
            alpha: config.alpha,
            beta: config.beta,
        };
        let sleep = config.effective_sleep();
        let engine = PoissonFocus::new(config.threshold, config.mu_min)?;
        Ok(Self {
            buffer: VecDeque::with_capacity(sleep + 1),
            config,
            params,
            sleep,
            engine,
            background: None,
            next_t: 0,
        })
    }

    pub fn config(&self) -> &FocusDesConfig {
        &self.config
    }

    pub fn engine(&self) -> &PoissonFocus {
        &self.engine
    }

    pub fn forecast_state(&self) -> Option<ForecastState> {
        self.background
    }

    /// Samples currently held for the delayed background update.
    pub fn delay_buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of steps consumed since construction or the last reset.
    pub fn steps(&self) -> usize {
        self.next_t
    }

    pub fn is_warming_up(&self) -> bool {
        self.background.is_none()
    }

    fn initialize_background(&mut self) -> Result<ForecastState, GrbError> {
        let warmup = self.sleep - self.config.m;
        let state = ForecastState::initialize(
            self.config.s_0,
            self.config.b_0,
            &self.buffer.make_contiguous()[..warmup],
        )?;
        self.buffer.drain(..warmup);
        tracing::debug!(
            level = state.level,
            slope = state.slope,
            sleep = self.sleep,
            "background initialized after warm-up"
        );
        Ok(state)
    }

    fn quality_control(&self) -> Detection {
        let Some(t_max) = self.config.t_max else {
            return Detection::from_statistic(self.engine.global_max(), self.engine.time_offset());
        };

        let candidates = self.engine.candidates();
        let Some((head, rest)) = candidates.split_last() else {
            return Detection::NONE;
        };
        if rest.is_empty() {
            tracing::debug!(
                t = head.t,
                policy = ?self.config.single_candidate_qc,
                "quality control found no candidate to rescan"
            );
            return match self.config.single_candidate_qc {
                SingleCandidatePolicy::ReportZero => Detection::NONE,
                SingleCandidatePolicy::ReportGlobalMax => Detection::from_statistic(
                    self.engine.global_max(),
                    self.engine.time_offset(),
                ),
            };
        }

        let floor = self.engine.floor();
        let mut best = 0.0;
        let mut offset = 0;
        for q in rest.iter().rev() {
            let age = head.t - q.t;
            if age > t_max {
                break;
            }
            let value = q.best_between(head, floor);
            if value > best {
                best = value;
                offset = age;
            }
        }

        if best > 0.0 {
            Detection::from_statistic(best, offset)
        } else {
            Detection::NONE
        }
    }
}

impl ChannelDetector for FocusDesDetector {
    fn step(&mut self, x: u64) -> Result<Detection, GrbError> {
        let t = self.next_t;
        self.next_t += 1;
        self.buffer.push_back(x);

        let background = match self.background {
            Some(state) => state,
            None if t < self.sleep => return Ok(Detection::NONE),
            None => self.initialize_background()?,
        };

        let delayed = self.buffer.pop_front().ok_or_else(|| {
            GrbError::numerical_issue("delay buffer empty after warm-up")
        })?;
        let background = self.params.update(background, delayed as f64);
        self.background = Some(background);

        let forecast = background.forecast(self.config.m);
        self.engine.update(x as f64, forecast)?;

        if self.engine.global_max() > 0.0 {
            return Ok(self.quality_control());
        }
        Ok(Detection::NONE)
    }

    fn reset(&mut self) {
        self.engine.reset();
        self.buffer.clear();
        self.background = None;
        self.next_t = 0;
    }
}
