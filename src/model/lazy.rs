//! Lazy collection handle for large discrete-series child sets.
//!
//! Reconstruction returns sub-recordings whose series list may hold
//! hundreds of entries; materializing them eagerly would read every tag
//! payload up front. `SeriesCollection` defers the store traversal until
//! first access, then caches the result for the handle's lifetime.
//!
//! The handle is an explicit {Unloaded, Loaded} state machine behind a
//! read-only sequence interface. If the backing store session has closed
//! by the time the loader runs, the loader either reopens the store or
//! fails with `MapError::StaleHandle`, depending on session configuration.

use crate::error::MapError;
use crate::model::DiscreteSeries;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

type Loader = Box<dyn Fn() -> Result<Vec<DiscreteSeries>, MapError> + Send + Sync>;

enum State {
    Unloaded(Loader),
    Loaded(Vec<DiscreteSeries>),
}

/// Read-only sequence of discrete series, possibly deferred.
#[derive(Clone)]
pub struct SeriesCollection {
    state: Arc<RwLock<State>>,
}

impl SeriesCollection {
    /// An already-materialized collection.
    pub fn loaded(items: Vec<DiscreteSeries>) -> Self {
        SeriesCollection {
            state: Arc::new(RwLock::new(State::Loaded(items))),
        }
    }

    /// A deferred collection; `loader` runs on first access.
    pub fn lazy(loader: Loader) -> Self {
        SeriesCollection {
            state: Arc::new(RwLock::new(State::Unloaded(loader))),
        }
    }

    /// Whether the underlying items have been materialized yet.
    pub fn is_loaded(&self) -> bool {
        matches!(*self.state.read(), State::Loaded(_))
    }

    /// Force materialization, then run `f` over the items.
    fn with_items<R>(&self, f: impl FnOnce(&[DiscreteSeries]) -> R) -> Result<R, MapError> {
        {
            let guard = self.state.read();
            if let State::Loaded(items) = &*guard {
                return Ok(f(items));
            }
        }
        let mut guard = self.state.write();
        // Another caller may have loaded between the read and write locks.
        if let State::Unloaded(loader) = &*guard {
            let items = loader()?;
            *guard = State::Loaded(items);
        }
        match &*guard {
            State::Loaded(items) => Ok(f(items)),
            State::Unloaded(_) => unreachable!("state loaded above"),
        }
    }

    pub fn len(&self) -> Result<usize, MapError> {
        self.with_items(|items| items.len())
    }

    pub fn is_empty(&self) -> Result<bool, MapError> {
        self.with_items(|items| items.is_empty())
    }

    pub fn get(&self, index: usize) -> Result<Option<DiscreteSeries>, MapError> {
        self.with_items(|items| items.get(index).cloned())
    }

    /// Materialize and clone the full item list.
    pub fn to_vec(&self) -> Result<Vec<DiscreteSeries>, MapError> {
        self.with_items(|items| items.to_vec())
    }
}

impl From<Vec<DiscreteSeries>> for SeriesCollection {
    fn from(items: Vec<DiscreteSeries>) -> Self {
        SeriesCollection::loaded(items)
    }
}

impl Default for SeriesCollection {
    fn default() -> Self {
        SeriesCollection::loaded(Vec::new())
    }
}

impl fmt::Debug for SeriesCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.read() {
            State::Unloaded(_) => f.write_str("SeriesCollection(<unloaded>)"),
            State::Loaded(items) => write!(f, "SeriesCollection({} items)", items.len()),
        }
    }
}

/// Equality forces both sides to materialize. A failed load (e.g. stale
/// handle) compares unequal rather than panicking.
impl PartialEq for SeriesCollection {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_vec(), other.to_vec()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
