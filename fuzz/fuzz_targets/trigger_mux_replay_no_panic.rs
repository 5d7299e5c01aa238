// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use grb_core::{ExecutionContext, NDET};
use grb_online::FocusDesConfig;
use grb_trigger::{CorruptionPolicy, MuxConfig, ObservationTable, Thresholds, TriggerMux};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);

    let config = MuxConfig {
        stride: common::bounded(cursor.next_u8(), 0, 8),
        t_start: f64::from(cursor.next_u8() % 8) / 8.0,
        max_consecutive_zeros: common::bounded(cursor.next_u8(), 0, 12),
        corruption_policy: if cursor.next_u8() & 1 == 0 {
            CorruptionPolicy::Abort
        } else {
            CorruptionPolicy::ResetChannel
        },
        parallel: false,
    };
    let detector = FocusDesConfig {
        m: common::bounded(cursor.next_u8(), 1, 8),
        sleep: Some(common::bounded(cursor.next_u8(), 10, 40)),
        t_max: Some(common::bounded(cursor.next_u8(), 0, 16)),
        ..FocusDesConfig::default()
    };
    let thresholds: Vec<Option<f64>> = (0..NDET)
        .map(|_| match cursor.next_u8() {
            0 => None,
            seed => Some(1.0 + f64::from(seed) / 32.0),
        })
        .collect();
    let Ok(thresholds) = Thresholds::from_options(&thresholds) else {
        return;
    };
    let Ok(mut mux) = TriggerMux::focus_des(config, thresholds, detector) else {
        return;
    };

    let rows = common::bounded(cursor.next_u8(), 0, 255);
    let mut table = ObservationTable::with_capacity(rows);
    for row in 0..rows {
        let fault = cursor.next_u8() % 16 == 0;
        let silent = cursor.next_u8() % 16 == 0;
        let counts: [u64; NDET] = std::array::from_fn(|_| {
            let count = common::count(cursor.next_u16());
            if silent { 0 } else { count }
        });
        if table.push_row(row as f64 * 0.064, fault, counts).is_err() {
            return;
        }
    }

    if let Ok(triggers) = mux.run(&table, &ExecutionContext::new()) {
        for event in triggers {
            assert!(event.index < table.len());
            assert!(event.detectors().len() >= 2);
        }
    }
});
