// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use grb_core::ChannelDetector;
use grb_online::{FocusDesConfig, FocusDesDetector, SingleCandidatePolicy};
use libfuzzer_sys::fuzz_target;

fn build_config(cursor: &mut common::ByteCursor<'_>) -> FocusDesConfig {
    let m = common::bounded(cursor.next_u8(), 0, 24);
    FocusDesConfig {
        threshold: common::real(cursor.next_u8(), 0.5, 12.0),
        alpha: common::real(cursor.next_u8(), 0.0, 1.0),
        beta: common::real(cursor.next_u8(), 0.0, 1.0),
        m,
        t_max: match cursor.next_u8() % 3 {
            0 => None,
            _ => Some(common::bounded(cursor.next_u8(), 0, 64)),
        },
        mu_min: common::real(cursor.next_u8(), 0.5, 4.0),
        sleep: match cursor.next_u8() % 4 {
            0 => None,
            _ => Some(m + common::bounded(cursor.next_u8(), 0, 48)),
        },
        s_0: match cursor.next_u8() % 3 {
            0 => Some(common::real(cursor.next_u8(), 0.0, 64.0)),
            _ => None,
        },
        b_0: match cursor.next_u8() % 3 {
            0 => Some(common::real(cursor.next_u8(), -1.0, 1.0)),
            _ => None,
        },
        single_candidate_qc: if cursor.next_u8() & 1 == 0 {
            SingleCandidatePolicy::ReportZero
        } else {
            SingleCandidatePolicy::ReportGlobalMax
        },
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let Ok(mut detector) = FocusDesDetector::new(build_config(&mut cursor)) else {
        return;
    };

    let steps = common::bounded(cursor.next_u8(), 1, 255) * 4;
    for _ in 0..steps {
        if cursor.is_exhausted() {
            break;
        }
        let seed = cursor.next_u16();
        if seed % 97 == 0 {
            detector.reset();
            continue;
        }
        match detector.step(common::count(seed)) {
            Ok(detection) => {
                assert!(detection.significance >= 0.0 || detection.significance.is_nan());
                if !detector.is_warming_up() {
                    assert_eq!(detector.delay_buffer_len(), detector.config().m);
                }
            }
            Err(_) => detector.reset(),
        }
    }
});
