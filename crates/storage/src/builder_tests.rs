// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use txf_core::{encode_record, encode_target};
use yare::parameterized;

fn log_with(records: &[(u64, &[u8])]) -> Vec<u8> {
    let mut bytes = encode_target("out.txt");
    for (seq, payload) in records {
        bytes.extend(encode_record(*seq, payload));
    }
    bytes
}

#[test]
fn complete_build_concatenates_in_sequence_order() {
    let log = log_with(&[(2, b"BBBBB"), (3, b"C"), (1, b"AAAAA")]);
    let built = build(&log, 3).unwrap();

    assert_eq!(built.target, "out.txt");
    assert_eq!(built.status, BuildStatus::Complete);
    assert_eq!(built.payload, b"AAAAABBBBBC");
}

#[test]
fn zero_expected_is_an_empty_complete_build() {
    let log = log_with(&[(1, b"x")]);
    let built = build(&log, 0).unwrap();
    assert!(built.is_complete());
    assert!(built.payload.is_empty());
}

#[test]
fn later_sequences_are_left_out() {
    let log = log_with(&[(1, b"a"), (2, b"b"), (3, b"c")]);
    let built = build(&log, 2).unwrap();
    assert_eq!(built.payload, b"ab");
}

#[parameterized(
    first = { &[2, 3], 3, &[1] },
    middle = { &[1, 3], 3, &[2] },
    last = { &[1, 2], 3, &[3] },
    several = { &[2], 4, &[1, 3, 4] },
    none_written = { &[], 2, &[1, 2] },
)]
fn incomplete_build_lists_missing(written: &[u64], expected: u64, missing: &[u64]) {
    let records: Vec<(u64, &[u8])> = written.iter().map(|s| (*s, &b"x"[..])).collect();
    let built = build(&log_with(&records), expected).unwrap();

    assert_eq!(
        built.status,
        BuildStatus::Incomplete {
            missing: missing.to_vec()
        }
    );
    assert!(built.payload.is_empty());
}

#[test]
fn missing_report_is_capped() {
    let built = build(&log_with(&[]), u64::MAX).unwrap();
    match built.status {
        BuildStatus::Incomplete { missing } => {
            assert_eq!(missing.len(), MAX_REPORTED_MISSING);
            assert_eq!(missing[0], 1);
        }
        BuildStatus::Complete => panic!("expected incomplete build"),
    }
}

#[test]
fn corrupt_log_is_an_error() {
    assert!(build(b"", 1).is_err());
}

fn fragments_and_order() -> impl Strategy<Value = (Vec<Vec<u8>>, Vec<usize>)> {
    proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..16), 1..12).prop_flat_map(
        |fragments| {
            let order = Just((0..fragments.len()).collect::<Vec<_>>()).prop_shuffle();
            (Just(fragments), order)
        },
    )
}

proptest! {
    #[test]
    fn build_ignores_arrival_order((fragments, order) in fragments_and_order()) {
        let mut log = encode_target("t");
        for &i in &order {
            log.extend(encode_record(i as u64 + 1, &fragments[i]));
        }

        let built = build(&log, fragments.len() as u64).unwrap();
        prop_assert!(built.is_complete());
        prop_assert_eq!(built.payload, fragments.concat());
    }

    #[test]
    fn build_reports_exactly_the_gaps(
        present in proptest::collection::vec(any::<bool>(), 1..20)
    ) {
        let mut log = encode_target("t");
        for (i, _) in present.iter().enumerate().filter(|(_, p)| **p) {
            log.extend(encode_record(i as u64 + 1, b"z"));
        }
        let expected_missing: Vec<u64> = present
            .iter()
            .enumerate()
            .filter(|(_, p)| !**p)
            .map(|(i, _)| i as u64 + 1)
            .collect();

        let built = build(&log, present.len() as u64).unwrap();
        if expected_missing.is_empty() {
            prop_assert!(built.is_complete());
        } else {
            prop_assert_eq!(built.status, BuildStatus::Incomplete { missing: expected_missing });
        }
    }
}
