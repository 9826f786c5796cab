//! Shared store session handle.
//!
//! One top-level write or read call holds the store exclusively for its
//! duration; the handle serializes access through a single lock. Lazy
//! collection handles keep a clone and may outlive `close()`; what
//! happens then (reopen vs fail) is the caller's configured policy, decided
//! where the loader runs.

use crate::error::StoreError;
use crate::store::{Mode, Store};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct SessionInner {
    store: Option<Store>,
    location: Option<PathBuf>,
    mode: Mode,
}

/// Cloneable handle to one store session.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<RwLock<SessionInner>>,
}

impl StoreHandle {
    pub fn open(location: impl AsRef<Path>, mode: Mode) -> Result<Self, StoreError> {
        let location = location.as_ref().to_path_buf();
        let store = Store::open(&location, mode)?;
        Ok(StoreHandle {
            inner: Arc::new(RwLock::new(SessionInner {
                store: Some(store),
                location: Some(location),
                mode,
            })),
        })
    }

    pub fn in_memory() -> Self {
        StoreHandle {
            inner: Arc::new(RwLock::new(SessionInner {
                store: Some(Store::in_memory()),
                location: None,
                mode: Mode::ReadWrite,
            })),
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.read().store.is_some()
    }

    pub fn location(&self) -> Option<PathBuf> {
        self.inner.read().location.clone()
    }

    /// Run `f` against the open store.
    pub fn with_store<R>(
        &self,
        f: impl FnOnce(&Store) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let guard = self.inner.read();
        match guard.store.as_ref() {
            Some(store) => f(store),
            None => Err(StoreError::Closed),
        }
    }

    /// Run `f` against the open store with mutable access.
    pub fn with_store_mut<R>(
        &self,
        f: impl FnOnce(&mut Store) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self.inner.write();
        match guard.store.as_mut() {
            Some(store) => f(store),
            None => Err(StoreError::Closed),
        }
    }

    /// Flush and release the underlying store.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        if let Some(mut store) = guard.store.take() {
            store.close()?;
        }
        Ok(())
    }

    /// Reopen a closed file-backed session read-only (stale-handle
    /// recovery). In-memory sessions have nowhere to reopen from.
    pub fn reopen_read_only(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        if guard.store.is_some() {
            return Ok(());
        }
        let location = guard.location.clone().ok_or(StoreError::Closed)?;
        guard.store = Some(Store::open(&location, Mode::ReadOnly)?);
        guard.mode = Mode::ReadOnly;
        Ok(())
    }
}
