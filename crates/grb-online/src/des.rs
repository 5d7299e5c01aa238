// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use grb_core::GrbError;

/// Double-exponential-smoothing parameters.
///
/// `alpha` weighs the newest sample into the level, `beta` weighs the newest
/// level change into the slope. Both must be finite and `>= 0`; values above
/// one are accepted but over-correct and are reported with a warning.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DesParams {
    pub alpha: f64,
    pub beta: f64,
}

impl DesParams {
    pub fn new(alpha: f64, beta: f64) -> Result<Self, GrbError> {
        let params = Self { alpha, beta };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), GrbError> {
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta)] {
            if !value.is_finite() || value < 0.0 {
                return Err(GrbError::invalid_input(format!(
                    "DES {name} must be finite and >= 0; got {value}"
                )));
            }
            if value > 1.0 {
                tracing::warn!(parameter = name, value, "DES parameter above 1 accepted as-is");
            }
        }
        Ok(())
    }

    /// One smoothing step:
    /// `s' = a*x + (1-a)*(s+b)`, `b' = b_*(s'-s) + (1-b_)*b`.
    pub fn update(&self, state: ForecastState, x: f64) -> ForecastState {
        let level = self.alpha * x + (1.0 - self.alpha) * (state.level + state.slope);
        let slope = self.beta * (level - state.level) + (1.0 - self.beta) * state.slope;
        ForecastState { level, slope }
    }
}

/// Level and slope of the background estimate.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForecastState {
    pub level: f64,
    pub slope: f64,
}

impl ForecastState {
    pub fn new(level: f64, slope: f64) -> Self {
        Self { level, slope }
    }

    /// Initial state from explicit values, falling back to the mean of the
    /// warm-up samples for the level and to a flat slope.
    pub fn initialize(
        level: Option<f64>,
        slope: Option<f64>,
        warmup: &[u64],
    ) -> Result<Self, GrbError> {
        let level = match level {
            Some(level) => level,
            None => {
                if warmup.is_empty() {
                    return Err(GrbError::invalid_input(
                        "DES level initialization requires at least one warm-up sample",
                    ));
                }
                warmup.iter().map(|&x| x as f64).sum::<f64>() / warmup.len() as f64
            }
        };
        Ok(Self {
            level,
            slope: slope.unwrap_or(0.0),
        })
    }

    /// Linear extrapolation `s + m*b`, used as the Poisson rate forecast.
    pub fn forecast(&self, m: usize) -> f64 {
        self.level + m as f64 * self.slope
    }
}
