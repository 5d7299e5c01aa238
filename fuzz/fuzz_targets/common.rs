// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

/// Reads fuzz input front to back, yielding zeros once it runs dry.
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn next_u8(&mut self) -> u8 {
        let byte = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos = self.pos.saturating_add(1);
        byte
    }

    pub fn next_u16(&mut self) -> u16 {
        u16::from_le_bytes([self.next_u8(), self.next_u8()])
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Maps `seed` into `[lo, hi]`.
pub fn bounded(seed: u8, lo: usize, hi: usize) -> usize {
    if hi <= lo {
        return lo;
    }
    lo + usize::from(seed) % (hi - lo + 1)
}

/// Maps `seed` onto `[lo, hi]` with occasional non-finite and boundary values.
pub fn real(seed: u8, lo: f64, hi: f64) -> f64 {
    match seed {
        0 => 0.0,
        1 => f64::NAN,
        2 => f64::INFINITY,
        3 => -1.0,
        _ => lo + (hi - lo) * f64::from(seed) / 255.0,
    }
}

/// Mostly small counts with rare spikes, long zero runs and huge values.
pub fn count(seed: u16) -> u64 {
    match seed % 64 {
        0 => 0,
        1 => u64::from(seed),
        2 => u64::MAX,
        _ => u64::from(seed % 32),
    }
}
