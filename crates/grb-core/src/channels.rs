// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GrbError;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Detector labels, in key sort order.
pub const DETECTOR_LABELS: [char; NUM_DETECTORS] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b'];
/// Energy-range labels, in key sort order.
pub const RANGE_LABELS: [char; NUM_RANGES] = ['0', '1', '2'];

pub const NUM_DETECTORS: usize = 12;
pub const NUM_RANGES: usize = 3;
/// Total channel count: every detector observed in every energy range.
pub const NDET: usize = NUM_DETECTORS * NUM_RANGES;

/// One detector channel, `n{detector}_r{range}`.
///
/// Ordering is detector-major, which matches the lexicographic order of the
/// rendered keys (`n0_r0 < n0_r1 < ... < nb_r2`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelKey {
    detector: u8,
    range: u8,
}

impl ChannelKey {
    pub fn new(detector: u8, range: u8) -> Result<Self, GrbError> {
        if usize::from(detector) >= NUM_DETECTORS {
            return Err(GrbError::invalid_input(format!(
                "detector id must be < {NUM_DETECTORS}; got {detector}"
            )));
        }
        if usize::from(range) >= NUM_RANGES {
            return Err(GrbError::invalid_input(format!(
                "range id must be < {NUM_RANGES}; got {range}"
            )));
        }
        Ok(Self { detector, range })
    }

    /// Key at position `index` of the fixed channel ordering.
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= NDET {
            return None;
        }
        Some(Self {
            detector: (index / NUM_RANGES) as u8,
            range: (index % NUM_RANGES) as u8,
        })
    }

    pub const fn detector(self) -> u8 {
        self.detector
    }

    pub const fn range(self) -> u8 {
        self.range
    }

    /// Position in the fixed channel ordering, also the threshold/column slot.
    pub const fn index(self) -> usize {
        self.detector as usize * NUM_RANGES + self.range as usize
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n{}_r{}",
            DETECTOR_LABELS[usize::from(self.detector)],
            RANGE_LABELS[usize::from(self.range)]
        )
    }
}

impl FromStr for ChannelKey {
    type Err = GrbError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            GrbError::invalid_input(format!(
                "invalid channel key '{raw}'; expected n<0-9ab>_r<0-2>"
            ))
        };
        let rest = raw.strip_prefix('n').ok_or_else(invalid)?;
        let (det, range) = rest.split_once("_r").ok_or_else(invalid)?;
        let det = single_char(det).ok_or_else(invalid)?;
        let range = single_char(range).ok_or_else(invalid)?;
        let detector = label_position(&DETECTOR_LABELS, det).ok_or_else(invalid)?;
        let range = label_position(&RANGE_LABELS, range).ok_or_else(invalid)?;
        Self::new(detector, range)
    }
}

fn single_char(raw: &str) -> Option<char> {
    let mut chars = raw.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

fn label_position(labels: &[char], label: char) -> Option<u8> {
    let label = label.to_ascii_lowercase();
    labels.iter().position(|c| *c == label).map(|p| p as u8)
}

#[cfg(feature = "serde")]
impl serde::Serialize for ChannelKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ChannelKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// All channel keys in the fixed sort order.
pub fn all_keys() -> [ChannelKey; NDET] {
    std::array::from_fn(|index| ChannelKey {
        detector: (index / NUM_RANGES) as u8,
        range: (index % NUM_RANGES) as u8,
    })
}

/// Cartesian product `detectors × ranges`, detector-major.
///
/// Ids outside the topology are skipped.
pub fn keys_for(detectors: &[u8], ranges: &[u8]) -> Vec<ChannelKey> {
    detectors
        .iter()
        .flat_map(|&det| ranges.iter().map(move |&range| (det, range)))
        .filter_map(|(det, range)| ChannelKey::new(det, range).ok())
        .collect()
}

/// Restricts `keys` to the requested detectors and ranges.
///
/// Only detectors and ranges that actually occur in `keys` survive, and the
/// result is the full sorted product of the surviving ids. `ranges = None`
/// keeps every range.
pub fn filter_keys(
    keys: &[ChannelKey],
    detectors: &[u8],
    ranges: Option<&[u8]>,
) -> Vec<ChannelKey> {
    let present_detectors: BTreeSet<u8> = keys.iter().map(|k| k.detector).collect();
    let present_ranges: BTreeSet<u8> = keys.iter().map(|k| k.range).collect();

    let wanted_detectors: BTreeSet<u8> = detectors.iter().copied().collect();
    let wanted_ranges: BTreeSet<u8> = match ranges {
        Some(ranges) => ranges.iter().copied().collect(),
        None => (0..NUM_RANGES as u8).collect(),
    };

    let out_detectors: Vec<u8> = present_detectors
        .intersection(&wanted_detectors)
        .copied()
        .collect();
    let out_ranges: Vec<u8> = present_ranges
        .intersection(&wanted_ranges)
        .copied()
        .collect();

    let mut out = keys_for(&out_detectors, &out_ranges);
    out.sort();
    out
}
