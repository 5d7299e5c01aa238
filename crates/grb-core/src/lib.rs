// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod channels;
pub mod control;
pub mod detectors;
pub mod error;
pub mod execution_context;
pub mod observability;

pub use channels::{
    ChannelKey, DETECTOR_LABELS, NDET, NUM_DETECTORS, NUM_RANGES, RANGE_LABELS, all_keys,
    filter_keys, keys_for,
};
pub use control::CancelToken;
pub use detectors::{ChannelDetector, Detection};
pub use error::GrbError;
pub use execution_context::ExecutionContext;
pub use observability::{ProgressSink, progress_percent};

