//! In-memory recording-tree entities (the source side of the mapping).
//!
//! A `Recording` owns sub-recordings, which own signals and discrete-event
//! series. Channel groups and spike-sorted clusters reference those same
//! objects without owning them; membership is expressed through explicit
//! identity keys rather than object pointers, so the synchronizer's diff
//! has a well-defined comparison key.

pub mod annotation;
pub mod lazy;

pub use annotation::{AnnotationValue, Annotations};
pub use lazy::SeriesCollection;

use chrono::{DateTime, Utc};
use std::fmt;

/// Identity of an entity for diffing and non-owning references.
///
/// Named entities are identified by their declared name; unnamed
/// deduplication-eligible leaves (signals, series) by a content key:
/// the hex-encoded blake3 hash of their payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKey {
    Name(String),
    Content(String),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Name(n) => f.write_str(n),
            IdentityKey::Content(h) => write!(f, "content:{h}"),
        }
    }
}

/// Common attribute surface shared by every entity kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attrs {
    pub description: Option<String>,
    pub origin: Option<String>,
    /// Creation time; truncated to whole seconds by the store mapping.
    pub created_at: Option<DateTime<Utc>>,
    /// Timestamp of the originating source file or acquisition.
    pub source_time: Option<DateTime<Utc>>,
    pub annotations: Annotations,
}

/// Root of a recording tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Recording {
    pub name: Option<String>,
    pub attrs: Attrs,
    pub sub_recordings: Vec<SubRecording>,
    pub groups: Vec<Group>,
}

/// One epoch of acquisition; owns signals and discrete series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubRecording {
    pub name: Option<String>,
    pub attrs: Attrs,
    pub signals: Vec<Signal>,
    pub series: SeriesCollection,
}

/// Channel group: non-owning references to signals, plus clusters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub name: Option<String>,
    pub attrs: Attrs,
    /// Identity keys of member signals (owned elsewhere in the tree).
    pub signals: Vec<IdentityKey>,
    pub clusters: Vec<Cluster>,
}

/// Spike-sorted unit: non-owning references to spike-train series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cluster {
    pub name: Option<String>,
    pub attrs: Attrs,
    /// Identity keys of member spike trains (owned elsewhere in the tree).
    pub trains: Vec<IdentityKey>,
}

/// Time base of a continuous signal.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeBase {
    /// Fixed-rate sampling: `offset + k * interval`.
    Regular {
        interval: f64,
        offset: f64,
        unit: String,
    },
    /// Irregular sampling with one explicit timestamp per sample.
    Irregular { times: Vec<f64>, unit: String },
}

impl TimeBase {
    pub fn unit(&self) -> &str {
        match self {
            TimeBase::Regular { unit, .. } => unit,
            TimeBase::Irregular { unit, .. } => unit,
        }
    }
}

/// Time-major two-dimensional payload (samples × channels).
#[derive(Debug, Clone, PartialEq)]
pub struct Payload2d {
    values: Vec<f64>,
    channels: usize,
}

impl Payload2d {
    /// Build from flattened time-major values. `values.len()` must be a
    /// multiple of `channels`.
    pub fn new(values: Vec<f64>, channels: usize) -> Self {
        debug_assert!(channels > 0, "payload needs at least one channel");
        debug_assert_eq!(values.len() % channels.max(1), 0);
        Payload2d { values, channels }
    }

    /// Build channel-major: one `Vec` per channel, equal lengths.
    pub fn from_channels(columns: &[Vec<f64>]) -> Self {
        let channels = columns.len();
        let samples = columns.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(samples * channels);
        for s in 0..samples {
            for column in columns {
                values.push(column[s]);
            }
        }
        Payload2d { values, channels }
    }

    pub fn samples(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.values.len() / self.channels
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Extract one channel column as a contiguous vector.
    pub fn channel(&self, index: usize) -> Vec<f64> {
        self.values
            .iter()
            .skip(index)
            .step_by(self.channels)
            .copied()
            .collect()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Continuous multi-channel signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub name: Option<String>,
    pub attrs: Attrs,
    /// Physical unit of the sample values, copied verbatim to the store.
    pub unit: String,
    pub data: Payload2d,
    pub time: TimeBase,
}

/// Fixed-shape waveform snippets attached to a spike train
/// (spike × channel × sample, flattened row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct Waveforms {
    pub data: Vec<f64>,
    pub spikes: usize,
    pub channels: usize,
    pub samples: usize,
    /// Sampling interval along the snippet's time axis.
    pub interval: f64,
    pub unit: String,
    pub left_sweep: Option<f64>,
}

/// One discrete-event series.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteSeries {
    pub name: Option<String>,
    pub attrs: Attrs,
    pub kind: SeriesKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesKind {
    /// Labeled instants.
    Events {
        times: Vec<f64>,
        unit: String,
        labels: Vec<String>,
    },
    /// Labeled intervals; `durations` must match `times` in length.
    Intervals {
        times: Vec<f64>,
        durations: Vec<f64>,
        unit: String,
        labels: Vec<String>,
    },
    /// Point-process spike times with an optional waveform block.
    SpikeTrain {
        times: Vec<f64>,
        unit: String,
        t_start: Option<f64>,
        t_stop: f64,
        waveforms: Option<Waveforms>,
    },
}

impl SeriesKind {
    pub fn times(&self) -> &[f64] {
        match self {
            SeriesKind::Events { times, .. } => times,
            SeriesKind::Intervals { times, .. } => times,
            SeriesKind::SpikeTrain { times, .. } => times,
        }
    }

    pub fn unit(&self) -> &str {
        match self {
            SeriesKind::Events { unit, .. } => unit,
            SeriesKind::Intervals { unit, .. } => unit,
            SeriesKind::SpikeTrain { unit, .. } => unit,
        }
    }

    pub fn is_spike_train(&self) -> bool {
        matches!(self, SeriesKind::SpikeTrain { .. })
    }
}
