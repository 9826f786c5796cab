//! Error types for the recording-tree ↔ container-store mapper.

use std::fmt;
use thiserror::Error;

/// Entity kinds appearing in source trees and error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Recording,
    SubRecording,
    Group,
    Cluster,
    Signal,
    Series,
}

impl EntityKind {
    /// Short tag used for default names ("Signal0", "SubRecording2", ...).
    pub fn tag(&self) -> &'static str {
        match self {
            EntityKind::Recording => "Recording",
            EntityKind::SubRecording => "SubRecording",
            EntityKind::Group => "Group",
            EntityKind::Cluster => "Cluster",
            EntityKind::Signal => "Signal",
            EntityKind::Series => "Series",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Kind + name chain locating an entity within a source tree.
///
/// Rendered as `Recording(session1)/SubRecording(trial3)/Signal(lfp)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityPath(Vec<(EntityKind, String)>);

impl EntityPath {
    pub fn root(kind: EntityKind, name: impl Into<String>) -> Self {
        EntityPath(vec![(kind, name.into())])
    }

    /// Extend the path with one more segment, returning the child path.
    pub fn child(&self, kind: EntityKind, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push((kind, name.into()));
        EntityPath(segments)
    }

    pub fn leaf(&self) -> Option<(EntityKind, &str)> {
        self.0.last().map(|(k, n)| (*k, n.as_str()))
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (kind, name)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}({})", kind, name)?;
        }
        Ok(())
    }
}

/// Container-store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("name already taken in this scope: {0}")]
    NameTaken(String),

    #[error("store is read-only")]
    ReadOnly,

    #[error("store session is closed")]
    Closed,

    #[error("payload shape {shape:?} invalid: {reason}")]
    BadShape { shape: Vec<usize>, reason: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Mapper errors
#[derive(Debug, Error)]
pub enum MapError {
    /// Not expected to occur given the unbounded suffix scheme; kept so an
    /// exhausted bounded retry surfaces loudly instead of looping.
    #[error("identity resolution exhausted for base name {base:?} after {attempts} attempts")]
    IdentityCollision { base: String, attempts: usize },

    #[error("missing required attribute {attribute:?} at {path}")]
    MissingRequiredAttribute {
        path: EntityPath,
        attribute: &'static str,
    },

    #[error("sync failed at {path}: {cause}")]
    SyncFailure {
        path: EntityPath,
        #[source]
        cause: Box<MapError>,
    },

    #[error("lazy collection accessed after its backing store session closed")]
    StaleHandle,

    /// A group or cluster reference matched nothing in the tree being
    /// written. Writes fail rather than store a broken link.
    #[error("dangling link at {path}: target {target} no longer exists")]
    DanglingLink { path: EntityPath, target: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MapError {
    /// Wrap this error as a subtree failure at `path`, unless it already
    /// carries path context of its own.
    pub fn at(self, path: EntityPath) -> MapError {
        match self {
            e @ MapError::SyncFailure { .. } => e,
            e @ MapError::MissingRequiredAttribute { .. } => e,
            cause => MapError::SyncFailure {
                path,
                cause: Box::new(cause),
            },
        }
    }
}

/// Non-fatal problems recovered during a write or read pass.
///
/// Returned alongside the result; the pass itself keeps going.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub path: EntityPath,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
