//! Public entry points: a store session plus the write/read operations.
//!
//! One `RecordingStore` wraps one store session. Writes synchronize a
//! recording tree into it; reads rebuild recording trees from it. The
//! session is exclusive for the duration of each call.

use crate::config::MapperConfig;
use crate::error::{Diagnostic, MapError};
use crate::map::{reconstruct, sync};
use crate::model::Recording;
use crate::store::{Mode, StoreHandle};
use std::path::Path;

/// Result of one write pass: the container the recording landed in and
/// the non-fatal diagnostics collected along the way.
#[derive(Debug)]
pub struct WriteOutcome {
    pub container: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// A mapped store session.
pub struct RecordingStore {
    handle: StoreHandle,
    config: MapperConfig,
}

impl RecordingStore {
    /// Open a file-backed session with default configuration.
    pub fn open(location: impl AsRef<Path>, mode: Mode) -> Result<Self, MapError> {
        Self::open_with(location, mode, MapperConfig::default())
    }

    pub fn open_with(
        location: impl AsRef<Path>,
        mode: Mode,
        config: MapperConfig,
    ) -> Result<Self, MapError> {
        Ok(RecordingStore {
            handle: StoreHandle::open(location, mode)?,
            config,
        })
    }

    pub fn in_memory() -> Self {
        Self::in_memory_with(MapperConfig::default())
    }

    pub fn in_memory_with(config: MapperConfig) -> Self {
        RecordingStore {
            handle: StoreHandle::in_memory(),
            config,
        }
    }

    /// Synchronize one recording into the store.
    pub fn write(&self, recording: &Recording) -> Result<WriteOutcome, MapError> {
        self.handle.with_store_mut(|store| {
            Ok(sync::sync_recording(store, recording).map(|(container, diagnostics)| {
                let container = store
                    .container(container)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                WriteOutcome {
                    container,
                    diagnostics,
                }
            }))
        })?
    }

    /// Synchronize several recordings, in order. Stops at the first
    /// failure; earlier writes stay in place.
    pub fn write_all(&self, recordings: &[Recording]) -> Result<Vec<WriteOutcome>, MapError> {
        recordings.iter().map(|r| self.write(r)).collect()
    }

    /// Read one recording back by container name.
    pub fn read(&self, name: &str) -> Result<Recording, MapError> {
        reconstruct::read_recording(&self.handle, &self.config, name)
    }

    /// Read every recording in the store.
    pub fn read_all(&self) -> Result<Vec<Recording>, MapError> {
        reconstruct::read_all(&self.handle, &self.config)
    }

    /// Flush and release the session. Lazy collections handed out by
    /// `read` become stale; what they do next is the configured policy.
    pub fn close(&self) -> Result<(), MapError> {
        Ok(self.handle.close()?)
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }
}
