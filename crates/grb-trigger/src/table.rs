// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use grb_core::{ChannelKey, GrbError, NDET, all_keys};

/// One row of the observation table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObservationRow<'a> {
    pub met: f64,
    pub fault: bool,
    pub counts: &'a [u64; NDET],
}

impl ObservationRow<'_> {
    /// True when every channel reads zero, i.e. all detectors are off.
    pub fn is_silent(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    pub fn count(&self, key: ChannelKey) -> u64 {
        self.counts[key.index()]
    }
}

/// Column-oriented observation table: mission elapsed time, fault flag and
/// one count column per channel in key order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationTable {
    met: Vec<f64>,
    fault: Vec<bool>,
    counts: Vec<[u64; NDET]>,
}

impl ObservationTable {
    pub fn new(
        met: Vec<f64>,
        fault: Vec<bool>,
        counts: Vec<[u64; NDET]>,
    ) -> Result<Self, GrbError> {
        if met.len() != fault.len() || met.len() != counts.len() {
            return Err(GrbError::invalid_input(format!(
                "observation columns must have equal length; got met={}, fault={}, counts={}",
                met.len(),
                fault.len(),
                counts.len()
            )));
        }
        let mut table = Self::with_capacity(met.len());
        for ((met, fault), counts) in met.into_iter().zip(fault).zip(counts) {
            table.push_row(met, fault, counts)?;
        }
        Ok(table)
    }

    pub fn with_capacity(rows: usize) -> Self {
        Self {
            met: Vec::with_capacity(rows),
            fault: Vec::with_capacity(rows),
            counts: Vec::with_capacity(rows),
        }
    }

    /// Appends a row; time must be finite and non-decreasing.
    pub fn push_row(
        &mut self,
        met: f64,
        fault: bool,
        counts: [u64; NDET],
    ) -> Result<(), GrbError> {
        if !met.is_finite() {
            return Err(GrbError::invalid_input(format!(
                "MET must be finite; got {met} at row {}",
                self.met.len()
            )));
        }
        if let Some(&last) = self.met.last()
            && met < last
        {
            return Err(GrbError::invalid_input(format!(
                "MET must be non-decreasing; got {met} after {last} at row {}",
                self.met.len()
            )));
        }
        self.met.push(met);
        self.fault.push(fault);
        self.counts.push(counts);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.met.len()
    }

    pub fn is_empty(&self) -> bool {
        self.met.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<ObservationRow<'_>> {
        Some(ObservationRow {
            met: *self.met.get(index)?,
            fault: *self.fault.get(index)?,
            counts: self.counts.get(index)?,
        })
    }

    pub fn met(&self) -> &[f64] {
        &self.met
    }

    /// First row at or after `from` whose fault flag is clear.
    pub fn next_clear_fault(&self, from: usize) -> Option<usize> {
        self.fault
            .get(from..)?
            .iter()
            .position(|&flag| !flag)
            .map(|pos| from + pos)
    }

    /// First row at or after `from` where at least one channel is positive.
    pub fn next_active_row(&self, from: usize) -> Option<usize> {
        self.counts
            .get(from..)?
            .iter()
            .position(|row| row.iter().any(|&c| c > 0))
            .map(|pos| from + pos)
    }
}

/// Per-channel significance thresholds, in standard-deviation units.
///
/// A non-finite entry permanently disables its channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds([f64; NDET]);

impl Thresholds {
    pub fn uniform(threshold: f64) -> Result<Self, GrbError> {
        Self::from_slice(&[threshold; NDET])
    }

    /// Thresholds aligned to the fixed key order.
    pub fn from_slice(values: &[f64]) -> Result<Self, GrbError> {
        let values: [f64; NDET] = values.try_into().map_err(|_| {
            GrbError::invalid_input(format!(
                "expected {NDET} thresholds, one per channel; got {}",
                values.len()
            ))
        })?;
        for (key, value) in all_keys().iter().zip(values) {
            if value.is_finite() && value <= 0.0 {
                return Err(GrbError::invalid_input(format!(
                    "threshold for {key} must be > 0 or non-finite to disable; got {value}"
                )));
            }
        }
        Ok(Self(values))
    }

    /// `None` entries disable their channel.
    pub fn from_options(values: &[Option<f64>]) -> Result<Self, GrbError> {
        let values: Vec<f64> = values.iter().map(|v| v.unwrap_or(f64::INFINITY)).collect();
        Self::from_slice(&values)
    }

    /// Disables every channel not listed in `keys`.
    pub fn restricted_to(mut self, keys: &[ChannelKey]) -> Self {
        for key in all_keys() {
            if !keys.contains(&key) {
                self.0[key.index()] = f64::INFINITY;
            }
        }
        self
    }

    pub fn get(&self, key: ChannelKey) -> f64 {
        self.0[key.index()]
    }

    pub fn is_enabled(&self, key: ChannelKey) -> bool {
        self.get(key).is_finite()
    }

    /// Enabled channels in key order.
    pub fn enabled_keys(&self) -> Vec<ChannelKey> {
        all_keys()
            .into_iter()
            .filter(|&key| self.is_enabled(key))
            .collect()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}
