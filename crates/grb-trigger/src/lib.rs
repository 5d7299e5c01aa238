// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod mux;
pub mod table;

pub use mux::{
    ChannelHit, ChannelState, CorruptionPolicy, MuxConfig, ReplayReport, ResetCause, ResetEvent,
    TriggerEvent, TriggerMux, is_coincident, trigger_mux,
};
pub use table::{ObservationRow, ObservationTable, Thresholds};
