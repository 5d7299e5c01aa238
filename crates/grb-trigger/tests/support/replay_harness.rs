// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use grb_core::{ChannelDetector, ChannelKey, Detection, GrbError, NDET, ProgressSink};
use grb_trigger::ObservationTable;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const MET_ORIGIN: f64 = 600_000_000.0;
pub const MET_STEP: f64 = 0.064;
/// Count that makes [`EchoDetector`] fail.
pub const POISON: u64 = 7_777;

pub fn met_at(index: usize) -> f64 {
    MET_ORIGIN + index as f64 * MET_STEP
}

pub fn key(raw: &str) -> ChannelKey {
    raw.parse().expect("valid channel key")
}

/// Mutable row-major table under construction.
#[derive(Clone, Debug)]
pub struct TableBuilder {
    counts: Vec<[u64; NDET]>,
    faults: Vec<bool>,
}

impl TableBuilder {
    pub fn flat(rows: usize, count: u64) -> Self {
        Self {
            counts: vec![[count; NDET]; rows],
            faults: vec![false; rows],
        }
    }

    /// Independent Poisson counts at `rate` on every channel.
    pub fn poisson(seed: u64, rows: usize, rate: f64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let dist = Poisson::new(rate).expect("valid Poisson mean");
        let counts = (0..rows)
            .map(|_| std::array::from_fn(|_| dist.sample(&mut rng) as u64))
            .collect();
        Self {
            counts,
            faults: vec![false; rows],
        }
    }

    pub fn fault(mut self, rows: std::ops::Range<usize>) -> Self {
        for flag in &mut self.faults[rows] {
            *flag = true;
        }
        self
    }

    pub fn silence(mut self, rows: std::ops::Range<usize>) -> Self {
        for row in &mut self.counts[rows] {
            *row = [0; NDET];
        }
        self
    }

    pub fn set(mut self, rows: std::ops::Range<usize>, channel: &str, count: u64) -> Self {
        let index = key(channel).index();
        for row in &mut self.counts[rows] {
            row[index] = count;
        }
        self
    }

    /// Redraws `channels` over `rows` from a Poisson at `rate`.
    pub fn burst(
        mut self,
        seed: u64,
        rows: std::ops::Range<usize>,
        channels: &[ChannelKey],
        rate: f64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let dist = Poisson::new(rate).expect("valid Poisson mean");
        for row in &mut self.counts[rows] {
            for channel in channels {
                row[channel.index()] = dist.sample(&mut rng) as u64;
            }
        }
        self
    }

    pub fn build(self) -> ObservationTable {
        let met = (0..self.counts.len()).map(met_at).collect();
        ObservationTable::new(met, self.faults, self.counts).expect("valid table")
    }
}

/// Stateless detector: counts of at least 100 read as `count / 10` sigma
/// with a changepoint three rows back.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoDetector;

impl ChannelDetector for EchoDetector {
    fn step(&mut self, x: u64) -> Result<Detection, GrbError> {
        if x == POISON {
            return Err(GrbError::numerical_issue("poisoned count"));
        }
        if x >= 100 {
            return Ok(Detection::new(x as f64 / 10.0, 3));
        }
        Ok(Detection::NONE)
    }

    fn reset(&mut self) {}
}

/// Counts steps across every channel sharing the same counter.
#[derive(Clone, Debug)]
pub struct StepCountingDetector {
    steps: Arc<AtomicUsize>,
}

impl StepCountingDetector {
    pub fn factory() -> (Arc<AtomicUsize>, impl Fn() -> StepCountingDetector) {
        let steps = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&steps);
        (steps, move || StepCountingDetector {
            steps: Arc::clone(&shared),
        })
    }
}

impl ChannelDetector for StepCountingDetector {
    fn step(&mut self, _x: u64) -> Result<Detection, GrbError> {
        self.steps.fetch_add(1, Ordering::Relaxed);
        Ok(Detection::NONE)
    }

    fn reset(&mut self) {}
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub rows: Mutex<Vec<usize>>,
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, row: usize, _total_rows: usize) {
        self.rows
            .lock()
            .expect("sink mutex should not be poisoned")
            .push(row);
    }
}
