// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GrbError;

/// Per-step output of a channel detector.
///
/// `significance` is in standard-deviation units (`sqrt(2 * statistic)`);
/// `offset` is the age, in steps, of the changepoint candidate behind it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Detection {
    pub significance: f64,
    pub offset: usize,
}

impl Detection {
    /// Nothing to report this step.
    pub const NONE: Self = Self {
        significance: 0.0,
        offset: 0,
    };

    pub fn new(significance: f64, offset: usize) -> Self {
        Self {
            significance,
            offset,
        }
    }

    /// Builds a detection from a likelihood-ratio statistic.
    pub fn from_statistic(statistic: f64, offset: usize) -> Self {
        Self {
            significance: (2.0 * statistic).sqrt(),
            offset,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.significance > 0.0
    }
}

/// Online detector contract for a single count channel.
///
/// A detector must be restorable to its construction-time state through
/// [`ChannelDetector::reset`]; the multiplexer relies on this for every fault
/// recovery path.
pub trait ChannelDetector: Send {
    fn step(&mut self, x: u64) -> Result<Detection, GrbError>;
    fn reset(&mut self);
}

impl<D: ChannelDetector + ?Sized> ChannelDetector for Box<D> {
    fn step(&mut self, x: u64) -> Result<Detection, GrbError> {
        (**self).step(x)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}
