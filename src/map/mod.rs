//! The bidirectional tree/graph mapper.
//!
//! The write path walks a recording tree top-down and drives diff-based
//! writes into the store (`sync`); the read path walks a store subtree and
//! rebuilds recording entities (`reconstruct`). Both share the identity
//! resolver, attribute codec, signal decomposer/recomposer, and reference
//! linker below.

pub mod attrs;
pub mod identity;
pub mod links;
pub mod reconstruct;
pub mod series;
pub mod signal;
pub mod sync;

/// Type tags stamped on store entities, used to filter child enumeration.
pub mod tags {
    pub const RECORDING: &str = "strata.recording";
    pub const SUB_RECORDING: &str = "strata.sub_recording";
    pub const GROUP: &str = "strata.group";
    pub const CLUSTER: &str = "strata.cluster";
    pub const SIGNAL: &str = "strata.signal";
    pub const EVENTS: &str = "strata.events";
    pub const INTERVALS: &str = "strata.intervals";
    pub const SPIKE_TRAIN: &str = "strata.spike_train";
    pub const POSITIONS: &str = "strata.positions";
    pub const EXTENTS: &str = "strata.extents";
    pub const WAVEFORMS: &str = "strata.waveforms";
    pub const METADATA: &str = "strata.metadata";

    /// Tag type for one discrete-series kind.
    pub fn for_series(kind: &crate::model::SeriesKind) -> &'static str {
        match kind {
            crate::model::SeriesKind::Events { .. } => EVENTS,
            crate::model::SeriesKind::Intervals { .. } => INTERVALS,
            crate::model::SeriesKind::SpikeTrain { .. } => SPIKE_TRAIN,
        }
    }
}

/// Reserved section property keys. Annotation keys never start with
/// `strata:`; the codec rejects ones that do.
pub mod props {
    pub const RESERVED_PREFIX: &str = "strata:";
    pub const ORIGIN: &str = "strata:origin";
    pub const SOURCE_TIME: &str = "strata:source_time";
    pub const CREATED_AT: &str = "strata:created_at";
    pub const UNNAMED: &str = "strata:unnamed";
    pub const CONTENT_KEY: &str = "strata:content_key";
    pub const T_START: &str = "strata:t_start";
    pub const T_STOP: &str = "strata:t_stop";
    pub const LEFT_SWEEP: &str = "strata:left_sweep";
}
