// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

#[path = "support/replay_harness.rs"]
mod replay_harness;

use grb_core::{CancelToken, ExecutionContext, GrbError, NDET};
use grb_online::FocusDesConfig;
use grb_trigger::{
    ChannelHit, CorruptionPolicy, MuxConfig, ResetCause, ResetEvent, Thresholds, TriggerMux,
    trigger_mux,
};
use replay_harness::{
    EchoDetector, POISON, StepCountingDetector, RecordingSink, TableBuilder, key, met_at,
};
use std::sync::atomic::Ordering;

fn uniform(threshold: f64) -> Thresholds {
    Thresholds::uniform(threshold).expect("valid thresholds")
}

#[test]
fn fault_window_resets_once_and_resumes_where_flag_clears() {
    let table = TableBuilder::flat(400, 8).fault(100..150).build();
    let mut mux =
        TriggerMux::focus_des(MuxConfig::default(), uniform(5.0), FocusDesConfig::default())
            .expect("valid mux");

    let triggers = mux.run(&table, &ExecutionContext::new()).expect("replay");
    assert!(triggers.is_empty());
    assert_eq!(
        mux.resets(),
        &[ResetEvent {
            index: 100,
            met: met_at(100),
            cause: ResetCause::FaultFlag { resume: Some(150) },
        }]
    );
}

#[test]
fn fault_window_rows_are_never_stepped() {
    let table = TableBuilder::flat(400, 8).fault(100..150).build();
    let (steps, factory) = StepCountingDetector::factory();
    let report = trigger_mux(
        &table,
        uniform(5.0),
        MuxConfig::default(),
        factory,
        &ExecutionContext::new(),
    )
    .expect("replay");

    assert!(report.triggers.is_empty());
    assert_eq!(steps.load(Ordering::Relaxed), NDET * 350);
}

#[test]
fn flagged_tail_ends_the_scan_cleanly() {
    let table = TableBuilder::flat(400, 8).fault(300..400).build();
    let (steps, factory) = StepCountingDetector::factory();
    let report = trigger_mux(
        &table,
        uniform(5.0),
        MuxConfig::default(),
        factory,
        &ExecutionContext::new(),
    )
    .expect("flagged tail is not an error");

    assert_eq!(steps.load(Ordering::Relaxed), NDET * 300);
    assert_eq!(
        report.resets,
        vec![ResetEvent {
            index: 300,
            met: met_at(300),
            cause: ResetCause::FaultFlag { resume: None },
        }]
    );
}

#[test]
fn outage_resets_and_fast_forwards_to_next_signal() {
    let table = TableBuilder::flat(200, 8).silence(50..60).build();
    let (steps, factory) = StepCountingDetector::factory();
    let report = trigger_mux(
        &table,
        uniform(5.0),
        MuxConfig::default(),
        factory,
        &ExecutionContext::new(),
    )
    .expect("replay");

    assert_eq!(steps.load(Ordering::Relaxed), NDET * 190);
    assert_eq!(
        report.resets,
        vec![ResetEvent {
            index: 50,
            met: met_at(50),
            cause: ResetCause::Outage { resume: Some(60) },
        }]
    );

    let table = TableBuilder::flat(100, 8).silence(80..100).build();
    let report = trigger_mux(
        &table,
        uniform(5.0),
        MuxConfig::default(),
        EchoDetector::default,
        &ExecutionContext::new(),
    )
    .expect("silent tail is not an error");
    assert_eq!(report.resets.len(), 1);
    assert_eq!(report.resets[0].cause, ResetCause::Outage { resume: None });
}

#[test]
fn stuck_channel_is_reset_alone() {
    let table = TableBuilder::flat(100, 8).set(10..40, "n2_r1", 0).build();
    let report = trigger_mux(
        &table,
        uniform(5.0),
        MuxConfig::default(),
        EchoDetector::default,
        &ExecutionContext::new(),
    )
    .expect("replay");

    let stale: Vec<(usize, ResetCause)> = report
        .resets
        .iter()
        .map(|event| (event.index, event.cause))
        .collect();
    assert_eq!(
        stale,
        vec![
            (20, ResetCause::StaleChannel(key("n2_r1"))),
            (31, ResetCause::StaleChannel(key("n2_r1"))),
        ]
    );
}

#[test]
fn one_detector_across_ranges_never_triggers() {
    let table = TableBuilder::flat(100, 8)
        .set(30..31, "n3_r0", 100)
        .set(30..31, "n3_r1", 110)
        .set(30..31, "n3_r2", 120)
        .build();
    let report = trigger_mux(
        &table,
        uniform(5.0),
        MuxConfig::default(),
        EchoDetector::default,
        &ExecutionContext::new(),
    )
    .expect("replay");
    assert!(report.triggers.is_empty());
    assert!(report.resets.is_empty());
}

#[test]
fn two_detectors_at_same_row_trigger_once_listing_both() {
    let table = TableBuilder::flat(100, 8)
        .set(60..61, "n3_r0", 100)
        .set(60..61, "n7_r2", 120)
        .build();
    let report = trigger_mux(
        &table,
        uniform(5.0),
        MuxConfig::default(),
        EchoDetector::default,
        &ExecutionContext::new(),
    )
    .expect("replay");

    assert_eq!(report.triggers.len(), 1);
    let event = &report.triggers[0];
    assert_eq!(event.id, 0);
    assert_eq!(event.index, 60);
    assert_eq!(event.met, met_at(60));
    assert_eq!(
        event.hits,
        vec![
            ChannelHit {
                key: key("n3_r0"),
                offset: -3,
                significance: 10.0,
            },
            ChannelHit {
                key: key("n7_r2"),
                offset: -3,
                significance: 12.0,
            },
        ]
    );
    assert_eq!(event.detectors().into_iter().collect::<Vec<_>>(), vec![3, 7]);
    assert_eq!(report.resets.len(), 1);
    assert_eq!(report.resets[0].cause, ResetCause::Trigger(0));
}

#[test]
fn stride_skips_rows_after_a_trigger() {
    let table = TableBuilder::flat(100, 8)
        .set(60..66, "n3_r0", 100)
        .set(60..66, "n7_r2", 120)
        .build();
    let config = MuxConfig {
        stride: 5,
        ..MuxConfig::default()
    };
    let report = trigger_mux(
        &table,
        uniform(5.0),
        config,
        EchoDetector::default,
        &ExecutionContext::new(),
    )
    .expect("replay");

    let rows: Vec<(usize, usize)> = report.triggers.iter().map(|e| (e.id, e.index)).collect();
    assert_eq!(rows, vec![(0, 60), (1, 65)]);
}

#[test]
fn hits_below_their_channel_threshold_are_ignored() {
    let table = TableBuilder::flat(100, 8)
        .set(60..61, "n3_r0", 100)
        .set(60..61, "n7_r2", 120)
        .build();
    let mut values = [5.0; NDET];
    values[key("n3_r0").index()] = 10.0;
    let report = trigger_mux(
        &table,
        Thresholds::from_slice(&values).expect("thresholds"),
        MuxConfig::default(),
        EchoDetector::default,
        &ExecutionContext::new(),
    )
    .expect("replay");
    // 10 sigma does not exceed a threshold of 10
    assert!(report.triggers.is_empty());
}

#[test]
fn disabled_channels_take_no_part_in_coincidence() {
    let table = TableBuilder::flat(100, 8)
        .set(60..61, "n3_r0", 100)
        .set(60..61, "n7_r2", 120)
        .build();
    let mut values = [5.0; NDET];
    values[key("n3_r0").index()] = f64::INFINITY;
    let mut mux = TriggerMux::new(
        MuxConfig::default(),
        Thresholds::from_slice(&values).expect("thresholds"),
        EchoDetector::default,
    )
    .expect("valid mux");
    assert_eq!(mux.channels().len(), NDET - 1);

    let triggers = mux.run(&table, &ExecutionContext::new()).expect("replay");
    assert!(triggers.is_empty());
}

#[test]
fn corrupted_background_aborts_with_channel_and_time() {
    let table = TableBuilder::flat(50, 8).set(12..13, "n5_r0", POISON).build();
    let err = trigger_mux(
        &table,
        uniform(5.0),
        MuxConfig::default(),
        EchoDetector::default,
        &ExecutionContext::new(),
    )
    .expect_err("corruption aborts by default");

    assert_eq!(err.code(), "corrupted_background");
    match err {
        GrbError::CorruptedBackground {
            channel,
            met,
            index,
            detail,
        } => {
            assert_eq!(channel, "n5_r0");
            assert_eq!(met, met_at(12));
            assert_eq!(index, 12);
            assert!(detail.contains("poisoned"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn corrupted_background_can_reset_the_channel_instead() {
    let table = TableBuilder::flat(50, 8).set(12..13, "n5_r0", POISON).build();
    let config = MuxConfig {
        corruption_policy: CorruptionPolicy::ResetChannel,
        ..MuxConfig::default()
    };
    let report = trigger_mux(
        &table,
        uniform(5.0),
        config,
        EchoDetector::default,
        &ExecutionContext::new(),
    )
    .expect("tolerated corruption");
    assert_eq!(
        report.resets,
        vec![ResetEvent {
            index: 12,
            met: met_at(12),
            cause: ResetCause::CorruptedBackground(key("n5_r0")),
        }]
    );
}

#[test]
fn t_start_skips_leading_fraction_of_rows() {
    let table = TableBuilder::flat(200, 8).build();
    let (steps, factory) = StepCountingDetector::factory();
    let config = MuxConfig {
        t_start: 0.25,
        ..MuxConfig::default()
    };
    trigger_mux(&table, uniform(5.0), config, factory, &ExecutionContext::new()).expect("replay");
    assert_eq!(steps.load(Ordering::Relaxed), NDET * 150);
}

#[test]
fn cancellation_stops_the_replay() {
    let table = TableBuilder::flat(50, 8).build();
    let cancel = CancelToken::new();
    cancel.cancel();
    let ctx = ExecutionContext::new().with_cancel(&cancel);
    let err = trigger_mux(
        &table,
        uniform(5.0),
        MuxConfig::default(),
        EchoDetector::default,
        &ctx,
    )
    .expect_err("cancelled replay");
    assert_eq!(err, GrbError::Cancelled);
}

#[test]
fn progress_is_reported_once_per_visited_row() {
    let table = TableBuilder::flat(40, 8).fault(10..20).build();
    let sink = RecordingSink::default();
    let ctx = ExecutionContext::new().with_progress_sink(&sink);
    trigger_mux(
        &table,
        uniform(5.0),
        MuxConfig::default(),
        EchoDetector::default,
        &ctx,
    )
    .expect("replay");

    let rows = sink.rows.lock().expect("sink mutex should not be poisoned");
    let expected: Vec<usize> = (0..=10).chain(20..40).collect();
    assert_eq!(*rows, expected);
}

#[test]
fn rerunning_a_multiplexer_starts_from_scratch() {
    let table = TableBuilder::flat(100, 8)
        .set(60..61, "n3_r0", 100)
        .set(60..61, "n7_r2", 120)
        .build();
    let mut mux = TriggerMux::new(MuxConfig::default(), uniform(5.0), EchoDetector::default)
        .expect("valid mux");
    let first = mux.run(&table, &ExecutionContext::new()).expect("replay").to_vec();
    let second = mux.run(&table, &ExecutionContext::new()).expect("replay").to_vec();
    assert_eq!(first, second);
    assert_eq!(mux.resets().len(), 1);
}
