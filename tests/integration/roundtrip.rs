//! Write a recording tree, read it back, compare field by field.

use super::test_utils::{session_recording, signal};
use strata::{Mode, Recording, RecordingStore, SeriesKind, TimeBase};
use tempfile::TempDir;

#[test]
fn full_tree_round_trips_in_memory() {
    let store = RecordingStore::in_memory();
    let recording = session_recording();

    let outcome = store.write(&recording).unwrap();
    assert_eq!(outcome.container, "session-01");
    assert!(outcome.diagnostics.is_empty());

    let read = store.read("session-01").unwrap();
    assert_eq!(read, recording);
}

#[test]
fn full_tree_round_trips_through_a_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");
    let recording = session_recording();

    let store = RecordingStore::open(&path, Mode::ReadWrite).unwrap();
    store.write(&recording).unwrap();
    store.close().unwrap();

    let reader = RecordingStore::open(&path, Mode::ReadOnly).unwrap();
    let read = reader.read("session-01").unwrap();
    assert_eq!(read, recording);
    reader.close().unwrap();
}

#[test]
fn irregular_time_base_round_trips() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    recording.sub_recordings[0].signals[0].time = TimeBase::Irregular {
        times: vec![0.0, 0.01, 0.05, 0.051, 0.2, 0.7, 1.0, 1.5],
        unit: "s".to_string(),
    };

    store.write(&recording).unwrap();
    let read = store.read("session-01").unwrap();
    assert_eq!(read, recording);
}

#[test]
fn unnamed_entities_come_back_unnamed() {
    let store = RecordingStore::in_memory();
    let recording = session_recording();
    store.write(&recording).unwrap();

    let read = store.read("session-01").unwrap();
    let signals = &read.sub_recordings[0].signals;
    assert_eq!(signals[0].name.as_deref(), Some("lfp"));
    assert_eq!(signals[1].name, None);
}

#[test]
fn unnamed_recording_gets_a_default_container_name() {
    let store = RecordingStore::in_memory();
    let recording = Recording {
        name: None,
        sub_recordings: vec![],
        groups: vec![],
        ..session_recording()
    };

    let outcome = store.write(&recording).unwrap();
    assert_eq!(outcome.container, "Recording0");

    // Read-back restores the missing name rather than the default.
    let read = store.read("Recording0").unwrap();
    assert_eq!(read.name, None);
}

#[test]
fn distinct_unnamed_signals_both_survive() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    recording.sub_recordings[0].signals = vec![
        signal(None, 1, 4, 0.0),
        signal(None, 1, 4, 50.0),
    ];
    recording.groups.clear();

    store.write(&recording).unwrap();
    let read = store.read("session-01").unwrap();
    let signals = &read.sub_recordings[0].signals;
    assert_eq!(signals.len(), 2);
    assert_ne!(signals[0].data, signals[1].data);
    assert!(signals.iter().all(|s| s.name.is_none()));
}

#[test]
fn group_may_share_a_name_with_a_sub_recording() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    // Names are unique per entity kind, so a group may reuse a
    // sub-recording's name within the same recording.
    recording.groups[0].name = recording.sub_recordings[0].name.clone();

    let outcome = store.write(&recording).unwrap();
    assert!(outcome.diagnostics.is_empty());

    let read = store.read("session-01").unwrap();
    assert_eq!(read, recording);
}

#[test]
fn spike_train_payload_survives_intact() {
    let store = RecordingStore::in_memory();
    let recording = session_recording();
    store.write(&recording).unwrap();

    let read = store.read("session-01").unwrap();
    let series = read.sub_recordings[0].series.to_vec().unwrap();
    let train = series
        .iter()
        .find(|s| s.name.as_deref() == Some("unit1"))
        .unwrap();
    match &train.kind {
        SeriesKind::SpikeTrain {
            times,
            t_start,
            t_stop,
            waveforms,
            ..
        } => {
            assert_eq!(times, &vec![0.4, 1.1, 2.9]);
            assert_eq!(*t_start, Some(0.0));
            assert_eq!(*t_stop, 10.0);
            let w = waveforms.as_ref().unwrap();
            assert_eq!((w.spikes, w.channels, w.samples), (3, 2, 3));
            assert_eq!(w.left_sweep, Some(0.001));
        }
        other => panic!("expected spike train, got {other:?}"),
    }
}

#[test]
fn read_all_returns_every_recording() {
    let store = RecordingStore::in_memory();
    let first = session_recording();
    let second = Recording {
        name: Some("session-02".to_string()),
        groups: vec![],
        sub_recordings: vec![strata::SubRecording {
            name: Some("probe".to_string()),
            signals: vec![signal(Some("eeg"), 2, 4, 7.0)],
            ..Default::default()
        }],
        ..Default::default()
    };

    store.write_all(&[first.clone(), second.clone()]).unwrap();
    let all = store.read_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0], first);
    assert_eq!(all[1], second);
}
