//! Deferred series loading and the stale-handle policies.

use super::test_utils::{events, session_recording};
use strata::{MapError, MapperConfig, Mode, OnStale, RecordingStore};
use tempfile::TempDir;

fn eager_config() -> MapperConfig {
    MapperConfig::default()
}

fn lazy_config(on_stale: OnStale) -> MapperConfig {
    MapperConfig {
        on_stale,
        lazy_threshold: 1,
        ..MapperConfig::default()
    }
}

#[test]
fn small_series_sets_load_eagerly() {
    let store = RecordingStore::in_memory_with(eager_config());
    store.write(&session_recording()).unwrap();

    let read = store.read("session-01").unwrap();
    assert!(read.sub_recordings[0].series.is_loaded());
}

#[test]
fn large_series_sets_defer_until_first_access() {
    let store = RecordingStore::in_memory_with(lazy_config(OnStale::Fail));
    store.write(&session_recording()).unwrap();

    let read = store.read("session-01").unwrap();
    let series = &read.sub_recordings[0].series;
    assert!(!series.is_loaded());

    assert_eq!(series.len().unwrap(), 3);
    assert!(series.is_loaded());

    let items = series.to_vec().unwrap();
    assert_eq!(items[0].name.as_deref(), Some("stim"));
    assert_eq!(items[2].name.as_deref(), Some("unit1"));
}

#[test]
fn loaded_collection_outlives_the_session() {
    let store = RecordingStore::in_memory_with(lazy_config(OnStale::Fail));
    store.write(&session_recording()).unwrap();

    let read = store.read("session-01").unwrap();
    let series = read.sub_recordings[0].series.clone();
    series.len().unwrap();

    store.close().unwrap();
    // Already materialized; the closed session no longer matters.
    assert_eq!(series.len().unwrap(), 3);
}

#[test]
fn stale_access_fails_under_the_fail_policy() {
    let store = RecordingStore::in_memory_with(lazy_config(OnStale::Fail));
    store.write(&session_recording()).unwrap();

    let read = store.read("session-01").unwrap();
    let series = read.sub_recordings[0].series.clone();
    assert!(!series.is_loaded());

    store.close().unwrap();
    let err = series.len().unwrap_err();
    assert!(matches!(err, MapError::StaleHandle));
}

#[test]
fn stale_access_recovers_under_the_reopen_policy() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");

    let store =
        RecordingStore::open_with(&path, Mode::ReadWrite, lazy_config(OnStale::Reopen)).unwrap();
    store.write(&session_recording()).unwrap();

    let read = store.read("session-01").unwrap();
    let series = read.sub_recordings[0].series.clone();
    store.close().unwrap();

    // The loader reopens the store read-only and retries.
    assert_eq!(series.len().unwrap(), 3);
    let items = series.to_vec().unwrap();
    assert_eq!(items[1].name.as_deref(), Some("states"));
}

#[test]
fn reopen_policy_cannot_help_an_in_memory_session() {
    let store = RecordingStore::in_memory_with(lazy_config(OnStale::Reopen));
    store.write(&session_recording()).unwrap();

    let read = store.read("session-01").unwrap();
    let series = read.sub_recordings[0].series.clone();
    store.close().unwrap();

    // Nowhere to reopen from; the store error surfaces instead.
    assert!(series.len().is_err());
}

#[test]
fn threshold_compares_per_sub_recording() {
    let config = MapperConfig {
        lazy_threshold: 2,
        ..MapperConfig::default()
    };
    let store = RecordingStore::in_memory_with(config);
    let mut recording = session_recording();
    recording.sub_recordings.push(strata::SubRecording {
        name: Some("sparse".to_string()),
        series: vec![events("once", vec![0.5])].into(),
        ..Default::default()
    });
    store.write(&recording).unwrap();

    let read = store.read("session-01").unwrap();
    // Three series meet the threshold, one does not.
    assert!(!read.sub_recordings[0].series.is_loaded());
    assert!(read.sub_recordings[1].series.is_loaded());
}
