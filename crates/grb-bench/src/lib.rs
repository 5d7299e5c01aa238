// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Seeded synthetic workloads shared by the benchmarks.

use grb_core::{GrbError, NDET};
use grb_trigger::ObservationTable;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};

/// Spacing of the binned light curves, in seconds.
pub const BIN_WIDTH: f64 = 0.064;

fn poisson(rate: f64) -> Result<Poisson<f64>, GrbError> {
    Poisson::new(rate)
        .map_err(|err| GrbError::invalid_input(format!("invalid Poisson rate {rate}: {err}")))
}

/// Background at `rate` with the samples in `burst` redrawn at `burst_rate`.
pub fn burst_counts(
    seed: u64,
    len: usize,
    rate: f64,
    burst: std::ops::Range<usize>,
    burst_rate: f64,
) -> Result<Vec<u64>, GrbError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let background = poisson(rate)?;
    let excess = poisson(burst_rate)?;
    Ok((0..len)
        .map(|t| {
            let dist = if burst.contains(&t) { &excess } else { &background };
            dist.sample(&mut rng) as u64
        })
        .collect())
}

/// A fault-free table with every channel at `rate` and detectors 0 and 1
/// raised to `burst_rate` over `burst`.
pub fn burst_table(
    seed: u64,
    rows: usize,
    rate: f64,
    burst: std::ops::Range<usize>,
    burst_rate: f64,
) -> Result<ObservationTable, GrbError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let background = poisson(rate)?;
    let excess = poisson(burst_rate)?;
    let mut table = ObservationTable::with_capacity(rows);
    for row in 0..rows {
        let in_burst = burst.contains(&row);
        // detectors 0 and 1 occupy the first six channels
        let counts: [u64; NDET] = std::array::from_fn(|channel| {
            let dist = if in_burst && channel < 6 {
                &excess
            } else {
                &background
            };
            dist.sample(&mut rng) as u64
        });
        table.push_row(row as f64 * BIN_WIDTH, false, counts)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::{burst_counts, burst_table};

    #[test]
    fn workloads_are_seeded() {
        let a = burst_counts(3, 500, 8.0, 400..420, 64.0).expect("counts");
        let b = burst_counts(3, 500, 8.0, 400..420, 64.0).expect("counts");
        assert_eq!(a, b);
        assert_eq!(a.len(), 500);

        let table = burst_table(3, 50, 8.0, 10..20, 64.0).expect("table");
        assert_eq!(table.len(), 50);
        assert!(burst_counts(3, 10, -1.0, 0..0, 1.0).is_err());
    }
}
