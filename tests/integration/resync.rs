//! Incremental re-synchronization: diffs against store state, not
//! blanket rewrites.

use super::test_utils::{entity_count, session_recording, signal};
use strata::{AnnotationValue, RecordingStore};

#[test]
fn identical_rewrite_is_a_no_op() {
    let store = RecordingStore::in_memory();
    let recording = session_recording();

    store.write(&recording).unwrap();
    let before = entity_count(&store);

    store.write(&recording).unwrap();
    assert_eq!(entity_count(&store), before);
    assert_eq!(store.read("session-01").unwrap(), recording);
}

#[test]
fn annotation_edits_update_in_place() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    store.write(&recording).unwrap();
    let before = entity_count(&store);

    recording
        .attrs
        .annotations
        .insert("depth_um".into(), AnnotationValue::Float(1300.0));
    recording.attrs.annotations.remove("probe_ok");
    store.write(&recording).unwrap();

    // Property edits reuse the existing section.
    assert_eq!(entity_count(&store), before);
    let read = store.read("session-01").unwrap();
    assert_eq!(
        read.attrs.annotations.get("depth_um"),
        Some(&AnnotationValue::Float(1300.0))
    );
    assert_eq!(read.attrs.annotations.get("probe_ok"), None);
}

#[test]
fn payload_edits_keep_the_same_arrays() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    store.write(&recording).unwrap();
    let before = entity_count(&store);

    recording.sub_recordings[0].signals[0] = signal(Some("lfp"), 3, 12, 5.0);
    store.write(&recording).unwrap();

    assert_eq!(entity_count(&store), before);
    let read = store.read("session-01").unwrap();
    assert_eq!(read.sub_recordings[0].signals[0].data.samples(), 12);
}

#[test]
fn added_signal_appears_without_disturbing_the_rest() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    store.write(&recording).unwrap();

    recording.sub_recordings[0]
        .signals
        .push(signal(Some("emg"), 2, 8, 50.0));
    store.write(&recording).unwrap();

    let read = store.read("session-01").unwrap();
    assert_eq!(read, recording);
}

#[test]
fn removed_signal_disappears_with_its_arrays() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    store.write(&recording).unwrap();
    let before = entity_count(&store);

    // Drop the unnamed single-channel signal: one array, one section.
    recording.sub_recordings[0].signals.truncate(1);
    store.write(&recording).unwrap();

    assert_eq!(entity_count(&store), before - 2);
    let read = store.read("session-01").unwrap();
    assert_eq!(read.sub_recordings[0].signals.len(), 1);
}

#[test]
fn renamed_sub_recording_is_a_replacement() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    store.write(&recording).unwrap();

    // A rename changes identity; the old grouping and its leaves go,
    // which also empties the group and cluster link tables.
    recording.sub_recordings[0].name = Some("trial1".to_string());
    recording.groups[0].signals.clear();
    recording.groups[0].clusters[0].trains.clear();
    store.write(&recording).unwrap();

    let read = store.read("session-01").unwrap();
    assert_eq!(read.sub_recordings.len(), 1);
    assert_eq!(read.sub_recordings[0].name.as_deref(), Some("trial1"));
    assert_eq!(read, recording);
}

#[test]
fn channel_count_changes_update_the_fragment_set() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    store.write(&recording).unwrap();
    let before = entity_count(&store);

    recording.sub_recordings[0].signals[0] = signal(Some("lfp"), 2, 8, 0.5);
    store.write(&recording).unwrap();

    // One fragment array fewer, same shared section.
    assert_eq!(entity_count(&store), before - 1);
    let read = store.read("session-01").unwrap();
    assert_eq!(read.sub_recordings[0].signals[0].data.channels(), 2);
}
