// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};

/// Piecewise-constant Poisson rate: `(rate, samples)` per segment.
pub fn piecewise_poisson(seed: u64, segments: &[(f64, usize)]) -> Vec<u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(segments.iter().map(|(_, len)| len).sum());
    for &(rate, len) in segments {
        let dist = Poisson::new(rate).expect("segment rate should be a valid Poisson mean");
        out.extend((0..len).map(|_| dist.sample(&mut rng) as u64));
    }
    out
}

pub fn stationary(seed: u64, rate: f64, len: usize) -> Vec<u64> {
    piecewise_poisson(seed, &[(rate, len)])
}

/// Background at `rate` followed by a burst of `burst_len` samples at
/// `burst_rate`.
pub fn with_burst(
    seed: u64,
    rate: f64,
    prefix: usize,
    burst_rate: f64,
    burst_len: usize,
) -> Vec<u64> {
    piecewise_poisson(seed, &[(rate, prefix), (burst_rate, burst_len)])
}

/// Renders counts the way the synthetic generator writes them.
pub fn render_count_file(rate: f64, counts: &[u64]) -> String {
    let mut out = format!("#{rate:.2}\n");
    for count in counts {
        out.push_str(&count.to_string());
        out.push('\n');
    }
    out
}
