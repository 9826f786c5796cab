//! Identity resolution: store-safe names and content-derived keys.
//!
//! Store names must be unique within a sibling scope; source entities may
//! be unnamed or carry duplicated names. `resolve_name` derives a default
//! from the entity kind and sibling count, then appends a deterministic
//! `-N` suffix until the candidate is free. Entities whose logical identity
//! is their payload (unnamed signals and series) additionally get a
//! blake3 content key, which is what the diff and the reference linker
//! compare, never object identity.

use crate::error::{EntityKind, MapError};
use crate::model::{DiscreteSeries, IdentityKey, Signal};
use blake3::Hasher;
use std::collections::BTreeSet;

/// Collision suffixes are unbounded in principle; the cap only turns an
/// impossible infinite loop into a loud error.
const MAX_SUFFIX: usize = 10_000;

/// Resolve a store-safe, collision-free name within one sibling scope.
///
/// `same_kind_count` is the number of already-present siblings of the same
/// kind, used for the `<KindTag><ordinal>` default.
pub fn resolve_name(
    basename: Option<&str>,
    kind: EntityKind,
    same_kind_count: usize,
    sibling_names: &BTreeSet<String>,
) -> Result<String, MapError> {
    let base = match basename {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{}{}", kind.tag(), same_kind_count),
    };
    if !sibling_names.contains(&base) {
        return Ok(base);
    }
    for suffix in 1..=MAX_SUFFIX {
        let candidate = format!("{base}-{suffix}");
        if !sibling_names.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(MapError::IdentityCollision {
        base,
        attempts: MAX_SUFFIX,
    })
}

fn feed_f64s(hasher: &mut Hasher, values: &[f64]) {
    for v in values {
        hasher.update(&v.to_le_bytes());
    }
}

/// Content key over a signal's raw payload.
///
/// key = blake3("signal" || channel_count || payload_le_bytes)
pub fn signal_content_key(signal: &Signal) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(b"signal");
    hasher.update(&(signal.data.channels() as u64).to_be_bytes());
    feed_f64s(&mut hasher, signal.data.values());
    *hasher.finalize().as_bytes()
}

/// Content key over a discrete series' time values.
///
/// key = blake3("series" || times_le_bytes)
pub fn series_content_key(series: &DiscreteSeries) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(b"series");
    feed_f64s(&mut hasher, series.kind.times());
    *hasher.finalize().as_bytes()
}

/// Diff/link identity of a signal: declared name, else content key.
pub fn signal_identity(signal: &Signal) -> IdentityKey {
    match &signal.name {
        Some(name) if !name.is_empty() => IdentityKey::Name(name.clone()),
        _ => IdentityKey::Content(hex::encode(signal_content_key(signal))),
    }
}

/// Diff/link identity of a discrete series.
pub fn series_identity(series: &DiscreteSeries) -> IdentityKey {
    match &series.name {
        Some(name) if !name.is_empty() => IdentityKey::Name(name.clone()),
        _ => IdentityKey::Content(hex::encode(series_content_key(series))),
    }
}
