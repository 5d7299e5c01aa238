// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Workspace-wide error type for trigger configuration, detection and replay.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GrbError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NumericalIssue(String),
    #[error(
        "corrupted background estimate over {channel} at MET {met} (row {index}): {detail}"
    )]
    CorruptedBackground {
        channel: String,
        met: f64,
        index: usize,
        detail: String,
    },
    #[error("cancelled")]
    Cancelled,
}

impl GrbError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    pub fn corrupted_background(
        channel: impl Into<String>,
        met: f64,
        index: usize,
        detail: impl Into<String>,
    ) -> Self {
        Self::CorruptedBackground {
            channel: channel.into(),
            met,
            index,
            detail: detail.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    /// Stable machine-readable code, used by structured error envelopes.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NumericalIssue(_) => "numerical_issue",
            Self::CorruptedBackground { .. } => "corrupted_background",
            Self::Cancelled => "cancelled",
        }
    }
}
