//! Session persistence: flush on close, reload on open, open modes.

use super::test_utils::{entity_count, session_recording};
use strata::{MapError, Mode, RecordingStore, StoreError};
use tempfile::TempDir;

#[test]
fn close_flushes_and_reopen_restores() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");
    let recording = session_recording();

    let writer = RecordingStore::open(&path, Mode::ReadWrite).unwrap();
    writer.write(&recording).unwrap();
    let count = entity_count(&writer);
    writer.close().unwrap();

    let reader = RecordingStore::open(&path, Mode::ReadWrite).unwrap();
    assert_eq!(entity_count(&reader), count);
    assert_eq!(reader.read("session-01").unwrap(), recording);
    reader.close().unwrap();
}

#[test]
fn resync_across_sessions_stays_incremental() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");
    let recording = session_recording();

    let first = RecordingStore::open(&path, Mode::ReadWrite).unwrap();
    first.write(&recording).unwrap();
    let count = entity_count(&first);
    first.close().unwrap();

    // The diff runs against reloaded state, so a second session writing
    // the same tree changes nothing.
    let second = RecordingStore::open(&path, Mode::ReadWrite).unwrap();
    second.write(&recording).unwrap();
    assert_eq!(entity_count(&second), count);
    second.close().unwrap();
}

#[test]
fn overwrite_mode_starts_from_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");

    let first = RecordingStore::open(&path, Mode::ReadWrite).unwrap();
    first.write(&session_recording()).unwrap();
    first.close().unwrap();

    let second = RecordingStore::open(&path, Mode::Overwrite).unwrap();
    assert!(second.read_all().unwrap().is_empty());
    second.close().unwrap();
}

#[test]
fn read_only_sessions_reject_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");

    let writer = RecordingStore::open(&path, Mode::ReadWrite).unwrap();
    writer.write(&session_recording()).unwrap();
    writer.close().unwrap();

    let reader = RecordingStore::open(&path, Mode::ReadOnly).unwrap();
    let err = reader.write(&session_recording()).unwrap_err();
    assert!(err.to_string().contains("read-only"), "{err}");
    reader.close().unwrap();
}

#[test]
fn missing_recording_reports_not_found() {
    let store = RecordingStore::in_memory();
    store.write(&session_recording()).unwrap();

    let err = store.read("no-such-session").unwrap_err();
    assert!(matches!(
        err,
        MapError::Store(StoreError::NotFound { kind: "container", .. })
    ));
}

#[test]
fn operations_after_close_fail_cleanly() {
    let store = RecordingStore::in_memory();
    store.write(&session_recording()).unwrap();
    store.close().unwrap();

    let err = store.read("session-01").unwrap_err();
    assert!(matches!(err, MapError::Store(StoreError::Closed)));
}
