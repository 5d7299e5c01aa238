// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Receives scan progress once per processed row.
///
/// Purely informational: implementations must not influence detection.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, row: usize, total_rows: usize);
}

/// Percentage of `row` over `total_rows`, clamped to `[0, 100]`.
pub fn progress_percent(row: usize, total_rows: usize) -> f64 {
    if total_rows <= 1 {
        return 100.0;
    }
    (row as f64 / (total_rows - 1) as f64 * 100.0).clamp(0.0, 100.0)
}
