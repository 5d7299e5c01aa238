// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod des;
pub mod focus;
pub mod focus_des;
pub mod stream;

pub use des::{DesParams, ForecastState};
pub use focus::{Candidate, PoissonFocus, RateFloor};
pub use focus_des::{FocusDesConfig, FocusDesDetector, SingleCandidatePolicy};
pub use stream::{CountFile, StreamOutcome, parse_counts, run_detector, run_stream};
