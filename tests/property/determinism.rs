//! Determinism properties: name resolution, content keys, attribute
//! round trips.

use proptest::prelude::*;
use std::collections::BTreeSet;
use strata::map::identity;
use strata::{
    AnnotationValue, Annotations, Attrs, EntityKind, Payload2d, RecordingStore, Signal,
    SubRecording, TimeBase,
};

fn some_signal(values: Vec<f64>, channels: usize) -> Signal {
    Signal {
        name: None,
        attrs: Attrs::default(),
        unit: "mV".to_string(),
        data: Payload2d::new(values, channels),
        time: TimeBase::Regular {
            interval: 0.001,
            offset: 0.0,
            unit: "s".to_string(),
        },
    }
}

#[test]
fn resolved_names_are_deterministic_and_collision_free() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                proptest::option::of("[A-Za-z][A-Za-z0-9_]{0,7}"),
                0usize..20,
                proptest::collection::btree_set("[A-Za-z][A-Za-z0-9_]{0,7}", 0..12),
            ),
            |(basename, ordinal, siblings)| {
                let first = identity::resolve_name(
                    basename.as_deref(),
                    EntityKind::Signal,
                    ordinal,
                    &siblings,
                )
                .unwrap();
                let second = identity::resolve_name(
                    basename.as_deref(),
                    EntityKind::Signal,
                    ordinal,
                    &siblings,
                )
                .unwrap();

                // Same scope, same result; never a taken name.
                assert_eq!(first, second);
                assert!(!siblings.contains(&first));

                // Resolving again with the result taken yields a fresh name.
                let mut taken = siblings.clone();
                taken.insert(first.clone());
                let next =
                    identity::resolve_name(basename.as_deref(), EntityKind::Signal, ordinal, &taken)
                        .unwrap();
                assert_ne!(first, next);
                assert!(!taken.contains(&next));

                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn default_names_follow_kind_and_ordinal() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(0usize..50), |ordinal| {
            let name = identity::resolve_name(
                None,
                EntityKind::SubRecording,
                ordinal,
                &BTreeSet::new(),
            )
            .unwrap();
            assert_eq!(name, format!("SubRecording{ordinal}"));
            Ok(())
        })
        .unwrap();
}

#[test]
fn signal_content_keys_track_payload_and_layout() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::vec(-1e6f64..1e6, 2..64),
            |mut values| {
                values.truncate(values.len() - values.len() % 2);
                let one_channel = some_signal(values.clone(), 1);
                let two_channel = some_signal(values.clone(), 2);

                // Stable across identical inputs.
                assert_eq!(
                    identity::signal_content_key(&one_channel),
                    identity::signal_content_key(&some_signal(values.clone(), 1))
                );
                // Channel layout is part of the key.
                assert_ne!(
                    identity::signal_content_key(&one_channel),
                    identity::signal_content_key(&two_channel)
                );

                // A perturbed payload diverges.
                let mut bumped = values.clone();
                bumped[0] += 1.0;
                assert_ne!(
                    identity::signal_content_key(&one_channel),
                    identity::signal_content_key(&some_signal(bumped, 1))
                );
                Ok(())
            },
        )
        .unwrap();
}

fn storable_annotation() -> impl Strategy<Value = AnnotationValue> {
    prop_oneof![
        "[a-z ]{0,16}".prop_map(AnnotationValue::Text),
        any::<bool>().prop_map(AnnotationValue::Bool),
        any::<i64>().prop_map(AnnotationValue::Int),
        (-1e9f64..1e9).prop_map(AnnotationValue::Float),
        proptest::collection::vec("[a-z]{1,6}", 2..5).prop_map(AnnotationValue::TextList),
        proptest::collection::vec(any::<i64>(), 2..5).prop_map(AnnotationValue::IntList),
        proptest::collection::vec(-1e9f64..1e9, 2..5).prop_map(AnnotationValue::FloatList),
    ]
}

#[test]
fn storable_annotations_round_trip_exactly() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::btree_map("[a-z][a-z0-9_]{0,7}", storable_annotation(), 0..6),
            |annotations: Annotations| {
                let store = RecordingStore::in_memory();
                let recording = strata::Recording {
                    name: Some("prop".to_string()),
                    attrs: Attrs {
                        annotations: annotations.clone(),
                        ..Attrs::default()
                    },
                    sub_recordings: vec![SubRecording {
                        name: Some("s0".to_string()),
                        ..Default::default()
                    }],
                    groups: vec![],
                };

                let outcome = store.write(&recording).unwrap();
                assert!(outcome.diagnostics.is_empty());

                let read = store.read("prop").unwrap();
                assert_eq!(read.attrs.annotations, annotations);
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn rewrites_converge_to_a_fixpoint() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::vec(-1e3f64..1e3, 4..32),
            |mut values| {
                values.truncate(values.len() - values.len() % 2);
                let recording = strata::Recording {
                    name: Some("fix".to_string()),
                    attrs: Attrs::default(),
                    sub_recordings: vec![SubRecording {
                        name: Some("s0".to_string()),
                        signals: vec![some_signal(values, 2)],
                        ..Default::default()
                    }],
                    groups: vec![],
                };

                let store = RecordingStore::in_memory();
                store.write(&recording).unwrap();
                let first = store
                    .handle()
                    .with_store(|s| Ok(s.entity_count()))
                    .unwrap();

                store.write(&recording).unwrap();
                let second = store
                    .handle()
                    .with_store(|s| Ok(s.entity_count()))
                    .unwrap();

                assert_eq!(first, second);
                assert_eq!(store.read("fix").unwrap(), recording);
                Ok(())
            },
        )
        .unwrap();
}
