//! Non-owning references: group and cluster membership keys, shared
//! leaf lifetime, content-keyed links.

use super::test_utils::{entity_count, events, intervals, session_recording, signal, spike_train};
use strata::map::identity;
use strata::{IdentityKey, MapError, RecordingStore};

fn content_key(sig: &strata::Signal) -> IdentityKey {
    identity::signal_identity(sig)
}

#[test]
fn group_and_cluster_links_survive_a_round_trip() {
    let store = RecordingStore::in_memory();
    let recording = session_recording();
    store.write(&recording).unwrap();

    let read = store.read("session-01").unwrap();
    assert_eq!(
        read.groups[0].signals,
        vec![IdentityKey::Name("lfp".to_string())]
    );
    assert_eq!(
        read.groups[0].clusters[0].trains,
        vec![IdentityKey::Name("unit1".to_string())]
    );
}

#[test]
fn content_keyed_link_to_an_unnamed_signal() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    let key = content_key(&recording.sub_recordings[0].signals[1]);
    recording.groups[0].signals.push(key.clone());
    store.write(&recording).unwrap();

    let read = store.read("session-01").unwrap();
    assert!(read.groups[0].signals.contains(&key));
}

#[test]
fn content_keyed_link_to_an_unnamed_spike_train() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    let mut train = spike_train("ignored", false);
    train.name = None;
    let key = identity::series_identity(&train);
    recording.sub_recordings[0].series = vec![train].into();
    recording.groups[0].clusters[0].trains = vec![key.clone()];
    store.write(&recording).unwrap();

    let read = store.read("session-01").unwrap();
    assert_eq!(read.groups[0].clusters[0].trains, vec![key]);
}

#[test]
fn dropped_signal_stays_alive_while_a_group_links_it() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    store.write(&recording).unwrap();
    let before = entity_count(&store);

    // The sub-recording no longer owns lfp, but the group still refers
    // to it; the leaf must survive the pass.
    recording.sub_recordings[0].signals.remove(0);
    store.write(&recording).unwrap();
    assert_eq!(entity_count(&store), before);

    let read = store.read("session-01").unwrap();
    assert_eq!(read.sub_recordings[0].signals.len(), 1);
    assert_eq!(
        read.groups[0].signals,
        vec![IdentityKey::Name("lfp".to_string())]
    );
}

#[test]
fn dropped_train_stays_linked_from_its_cluster() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    store.write(&recording).unwrap();

    // unit1 leaves the sub-recording but the cluster still refers to it.
    recording.sub_recordings[0].series =
        vec![events("stim", vec![1.0, 4.0, 6.5]), intervals("states")].into();
    store.write(&recording).unwrap();

    let read = store.read("session-01").unwrap();
    assert_eq!(read.sub_recordings[0].series.to_vec().unwrap().len(), 2);
    assert_eq!(
        read.groups[0].clusters[0].trains,
        vec![IdentityKey::Name("unit1".to_string())]
    );
}

#[test]
fn unreferenced_leaf_is_collected_on_the_next_pass() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    store.write(&recording).unwrap();
    let before = entity_count(&store);

    recording.sub_recordings[0].signals.remove(0);
    store.write(&recording).unwrap();

    // Last reference gone: three fragment arrays plus the shared section.
    recording.groups[0].signals.clear();
    store.write(&recording).unwrap();
    assert_eq!(entity_count(&store), before - 4);

    let read = store.read("session-01").unwrap();
    assert!(read.groups[0].signals.is_empty());
}

#[test]
fn reference_to_nothing_is_a_dangling_link() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    recording.groups[0]
        .signals
        .push(IdentityKey::Name("no-such-signal".to_string()));

    let err = store.write(&recording).unwrap_err();
    assert!(matches!(err, MapError::DanglingLink { .. }));
}

#[test]
fn ambiguous_name_match_links_first_and_reports() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    // Two sub-recordings each owning a signal named "mua": the group
    // reference matches both.
    recording.sub_recordings.push(strata::SubRecording {
        name: Some("trial1".to_string()),
        signals: vec![signal(Some("mua"), 1, 4, 1.0)],
        ..Default::default()
    });
    recording.sub_recordings[0]
        .signals
        .push(signal(Some("mua"), 1, 4, 2.0));
    recording.groups[0]
        .signals
        .push(IdentityKey::Name("mua".to_string()));

    let outcome = store.write(&recording).unwrap();
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.contains("matches 2")));

    let read = store.read("session-01").unwrap();
    assert!(read.groups[0]
        .signals
        .contains(&IdentityKey::Name("mua".to_string())));
}

#[test]
fn cluster_keeps_its_train_after_payload_updates() {
    let store = RecordingStore::in_memory();
    let mut recording = session_recording();
    store.write(&recording).unwrap();

    // Rewriting the train in place must not invalidate the link.
    recording.sub_recordings[0].series = vec![spike_train("unit1", false)].into();
    store.write(&recording).unwrap();

    let read = store.read("session-01").unwrap();
    assert_eq!(
        read.groups[0].clusters[0].trains,
        vec![IdentityKey::Name("unit1".to_string())]
    );
}
