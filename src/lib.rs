//! Strata: recording-tree to container-store mapping
//!
//! A bidirectional mapper between an in-memory electrophysiology
//! recording tree and a flat, typed container store, with incremental
//! diff-based synchronization: unchanged children are left untouched,
//! changed ones updated in place, vanished ones detached and collected
//! once nothing references them.

pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod map;
pub mod model;
pub mod store;

pub use config::{MapperConfig, OnStale};
pub use error::{Diagnostic, EntityKind, EntityPath, MapError, StoreError};
pub use io::{RecordingStore, WriteOutcome};
pub use model::{
    AnnotationValue, Annotations, Attrs, Cluster, DiscreteSeries, Group, IdentityKey, Payload2d,
    Recording, SeriesCollection, SeriesKind, Signal, SubRecording, TimeBase, Waveforms,
};
pub use store::Mode;
