// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Poisson-FOCuS changepoint statistic.
//!
//! Every candidate is a point `(t, X_t, Λ_t)` of cumulative observed counts
//! and cumulative forecast rate. The likelihood-ratio statistic for "the rate
//! was multiplied by `mu` starting after candidate `q`" up to a later point
//! `p` only depends on `S = X_p - X_q` and `L = Λ_p - Λ_q`:
//!
//! `f(mu) = S ln(mu) - L (mu - 1)`,
//!
//! maximized over `mu >= mu_min`. For a fixed `mu` the best anchor minimizes
//! `X - k Λ` with `k = (mu - 1) / ln(mu)`, so only the lower convex hull of the
//! candidate points can ever hold the maximum, and a hull edge whose slope
//! does not exceed `k_min = k(mu_min)` can never indicate an increase.

use grb_core::GrbError;

/// Lower bound on the detectable rate ratio, with derived constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateFloor {
    mu_min: f64,
    ln_mu_min: f64,
    k_min: f64,
}

impl RateFloor {
    pub fn new(mu_min: f64) -> Result<Self, GrbError> {
        if !mu_min.is_finite() || mu_min < 1.0 {
            return Err(GrbError::invalid_input(format!(
                "mu_min must be finite and >= 1; got {mu_min}"
            )));
        }
        let ln_mu_min = mu_min.ln();
        // limit of (mu - 1) / ln(mu) as mu -> 1
        let k_min = if mu_min > 1.0 {
            (mu_min - 1.0) / ln_mu_min
        } else {
            1.0
        };
        Ok(Self {
            mu_min,
            ln_mu_min,
            k_min,
        })
    }

    pub fn mu_min(&self) -> f64 {
        self.mu_min
    }

    /// Maximum of `S ln(mu) - L (mu - 1)` over `mu >= mu_min`, floored at 0.
    pub fn max_statistic(&self, s: f64, l: f64) -> f64 {
        if l <= 0.0 || s <= 0.0 {
            return 0.0;
        }
        let ratio = s / l;
        if ratio >= self.mu_min {
            s * ratio.ln() - (s - l)
        } else if ratio > self.k_min {
            s * self.ln_mu_min - l * (self.mu_min - 1.0)
        } else {
            0.0
        }
    }
}

/// Changepoint hypothesis anchored at time `t`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// Anchor time; the hypothesised change starts right after it.
    pub t: usize,
    /// Cumulative observed counts up to `t`.
    pub counts: f64,
    /// Cumulative forecast rate up to `t`.
    pub rate: f64,
}

impl Candidate {
    const ORIGIN: Self = Self {
        t: 0,
        counts: 0.0,
        rate: 0.0,
    };

    pub fn start(&self) -> usize {
        self.t
    }

    /// Best statistic for a change starting after `self` and persisting until
    /// `other`'s time.
    pub fn best_between(&self, other: &Candidate, floor: &RateFloor) -> f64 {
        floor.max_statistic(other.counts - self.counts, other.rate - self.rate)
    }

    fn advanced(&self, observed: f64, forecast: f64) -> Self {
        Self {
            t: self.t + 1,
            counts: self.counts + observed,
            rate: self.rate + forecast,
        }
    }
}

/// Online Poisson-FOCuS engine.
///
/// `global_max` is the running maximum statistic since construction or the
/// last [`reset`](Self::reset). It only moves when a step's maximum exceeds
/// both the critical level `threshold^2 / 2` and the value already held, so it
/// is zero until the first crossing and never decreases afterwards.
/// `time_offset` keeps tracking the age of the anchor that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct PoissonFocus {
    critical: f64,
    floor: RateFloor,
    // Lower hull of anchors, oldest first; the last entry is the running head.
    candidates: Vec<Candidate>,
    global_max: f64,
    time_offset: usize,
}

impl PoissonFocus {
    /// `threshold` is in standard-deviation units.
    pub fn new(threshold: f64, mu_min: f64) -> Result<Self, GrbError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(GrbError::invalid_input(format!(
                "FOCuS threshold must be finite and > 0; got {threshold}"
            )));
        }
        Ok(Self {
            critical: threshold * threshold / 2.0,
            floor: RateFloor::new(mu_min)?,
            candidates: vec![Candidate::ORIGIN],
            global_max: 0.0,
            time_offset: 0,
        })
    }

    pub fn reset(&mut self) {
        self.candidates.clear();
        self.candidates.push(Candidate::ORIGIN);
        self.global_max = 0.0;
        self.time_offset = 0;
    }

    pub fn global_max(&self) -> f64 {
        self.global_max
    }

    /// Current age of the anchor behind `global_max`, zero when `global_max`
    /// is zero.
    pub fn time_offset(&self) -> usize {
        self.time_offset
    }

    /// Candidates ordered oldest to newest, the newest being the current time.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn floor(&self) -> &RateFloor {
        &self.floor
    }

    pub fn mu_min(&self) -> f64 {
        self.floor.mu_min()
    }

    /// Ingests one observed count against its forecast rate.
    pub fn update(&mut self, observed: f64, forecast: f64) -> Result<(), GrbError> {
        if !observed.is_finite() || observed < 0.0 {
            return Err(GrbError::numerical_issue(format!(
                "FOCuS observed count must be finite and >= 0; got {observed}"
            )));
        }
        if !forecast.is_finite() || forecast <= 0.0 {
            return Err(GrbError::numerical_issue(format!(
                "FOCuS forecast rate must be finite and > 0; got {forecast}"
            )));
        }

        let head = self.candidates[self.candidates.len() - 1];
        let next = head.advanced(observed, forecast);
        if self.global_max > 0.0 {
            self.time_offset += 1;
        }

        while self.candidates.len() >= 2 {
            let len = self.candidates.len();
            let prev = self.candidates[len - 2];
            let last = self.candidates[len - 1];
            // slope(prev, last) >= slope(last, next): `last` is not a hull vertex
            let left = (last.counts - prev.counts) * (next.rate - last.rate);
            let right = (next.counts - last.counts) * (last.rate - prev.rate);
            if left >= right {
                self.candidates.pop();
            } else {
                break;
            }
        }

        // Hull slopes increase towards the head, so if the final edge cannot
        // indicate an increase no anchor can.
        if let Some(last) = self.candidates.last()
            && next.counts - last.counts <= self.floor.k_min * (next.rate - last.rate)
        {
            self.candidates.clear();
        }
        self.candidates.push(next);

        let mut best = 0.0;
        let mut offset = 0;
        for q in &self.candidates[..self.candidates.len() - 1] {
            let value = q.best_between(&next, &self.floor);
            if value > best {
                best = value;
                offset = next.t - q.t;
            }
        }
        if !best.is_finite() {
            return Err(GrbError::numerical_issue(format!(
                "FOCuS statistic became non-finite at t={}",
                next.t
            )));
        }

        if best > self.critical && best > self.global_max {
            self.global_max = best;
            self.time_offset = offset;
        }
        Ok(())
    }
}
