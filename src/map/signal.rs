//! Signal decomposition and recomposition.
//!
//! The store holds flat arrays only, so an N-channel composite signal is
//! written as N single-channel arrays named `<name>.<idx>`, all pointing
//! at one shared metadata section. Dimension 0 carries the time base
//! (sampled for fixed-rate, range with explicit ticks for irregular);
//! dimension 1 is a set placeholder marking "one column of a multi-channel
//! signal". Recomposition groups a grouping's arrays by shared section
//! identity, orders channels by the numeric name suffix, and stacks them
//! back into one time-major payload.
//!
//! No resampling or unit conversion happens here; units and sample
//! spacing are copied verbatim in both directions.

use crate::error::{Diagnostic, EntityPath, MapError};
use crate::map::{attrs, props, tags};
use crate::model::{Payload2d, Signal, TimeBase};
use crate::store::{
    ArrayId, Dimension, Entity, GroupingId, PropValue, SectionId, Store,
};
use tracing::debug;

/// Dimension 0 for a decomposed channel array.
fn time_dimension(time: &TimeBase) -> Dimension {
    match time {
        TimeBase::Regular {
            interval,
            offset,
            unit,
        } => Dimension::Sampled {
            interval: *interval,
            offset: *offset,
            unit: unit.clone(),
            label: "time".to_string(),
        },
        TimeBase::Irregular { times, unit } => Dimension::Range {
            ticks: times.clone(),
            unit: unit.clone(),
            label: "time".to_string(),
        },
    }
}

fn time_base_of(dimension: &Dimension) -> Option<TimeBase> {
    match dimension {
        Dimension::Sampled {
            interval,
            offset,
            unit,
            ..
        } => Some(TimeBase::Regular {
            interval: *interval,
            offset: *offset,
            unit: unit.clone(),
        }),
        Dimension::Range { ticks, unit, .. } => Some(TimeBase::Irregular {
            times: ticks.clone(),
            unit: unit.clone(),
        }),
        Dimension::Set => None,
    }
}

/// Channel ordinal from a fragment name (`lfp.12` → 12). Lexicographic
/// order breaks past ten channels, so recomposition sorts by this.
fn channel_ordinal(name: &str) -> Option<u64> {
    name.rsplit_once('.').and_then(|(_, idx)| idx.parse().ok())
}

/// Whether an existing fragment set can be updated in place for `signal`.
///
/// A dimension descriptor's kind is fixed at creation, so a time-base kind
/// change (regular ↔ irregular) forces delete-and-recreate instead.
pub fn can_update_in_place(store: &Store, fragments: &[ArrayId], signal: &Signal) -> bool {
    let Some(first) = fragments.first() else {
        return false;
    };
    let Ok(array) = store.array(*first) else {
        return false;
    };
    match (array.dimensions.first(), &signal.time) {
        (Some(Dimension::Sampled { .. }), TimeBase::Regular { .. }) => true,
        (Some(Dimension::Range { .. }), TimeBase::Irregular { .. }) => true,
        _ => false,
    }
}

fn write_shared_metadata(
    store: &mut Store,
    fragments: &[ArrayId],
    signal: &Signal,
    name: &str,
    parent_section: SectionId,
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
) -> Result<SectionId, MapError> {
    let first = Entity::Array(fragments[0]);
    let ctx = attrs::SectionCtx::new(name, tags::SIGNAL).under(parent_section);
    attrs::write_attrs(store, first, &signal.attrs, signal.name.is_none(), &ctx, path, diags)?;
    // Attrs may have stayed lazy; the shared section is structural for a
    // decomposed signal, so force it.
    let section = attrs::ensure_section(store, first, &ctx)?;
    if signal.name.is_none() {
        let key = hex::encode(crate::map::identity::signal_content_key(signal));
        store.set_property(section, props::CONTENT_KEY, vec![PropValue::Text(key)])?;
    } else {
        store.remove_property(section, props::CONTENT_KEY)?;
    }
    for fragment in fragments {
        store.set_section(Entity::Array(*fragment), section)?;
        store.set_definition(Entity::Array(*fragment), signal.attrs.description.clone())?;
    }
    Ok(section)
}

/// Decompose `signal` into fresh per-channel arrays under `grouping`.
pub fn write_signal(
    store: &mut Store,
    grouping: GroupingId,
    name: &str,
    signal: &Signal,
    parent_section: SectionId,
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
) -> Result<Vec<ArrayId>, MapError> {
    let channels = signal.data.channels();
    let samples = signal.data.samples();
    debug!(name, channels, samples, "decomposing signal");

    let dim0 = time_dimension(&signal.time);
    let mut fragments = Vec::with_capacity(channels);
    for idx in 0..channels {
        let column = signal.data.channel(idx);
        let array = store.create_array(
            grouping,
            &format!("{name}.{idx}"),
            tags::SIGNAL,
            column,
            vec![samples],
            vec![dim0.clone(), Dimension::Set],
        )?;
        store.array_mut(array)?.unit = Some(signal.unit.clone());
        fragments.push(array);
    }
    write_shared_metadata(store, &fragments, signal, name, parent_section, path, diags)?;
    Ok(fragments)
}

/// Update an existing fragment set in place. `fragments` must be in
/// channel order and `can_update_in_place` must hold.
pub fn update_signal(
    store: &mut Store,
    grouping: GroupingId,
    name: &str,
    fragments: &[ArrayId],
    signal: &Signal,
    parent_section: SectionId,
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
) -> Result<Vec<ArrayId>, MapError> {
    let channels = signal.data.channels();
    let samples = signal.data.samples();
    let dim0 = time_dimension(&signal.time);

    let mut kept: Vec<ArrayId> = Vec::with_capacity(channels);
    for (idx, fragment) in fragments.iter().enumerate() {
        if idx >= channels {
            // Channel disappeared; its fragment goes with it.
            store.detach_array(grouping, *fragment)?;
            store.purge_links_to_array(*fragment)?;
            store.delete_array(*fragment)?;
            continue;
        }
        let array = store.array_mut(*fragment)?;
        array.data = signal.data.channel(idx);
        array.shape = vec![samples];
        array.dimensions[0] = dim0.clone();
        array.unit = Some(signal.unit.clone());
        kept.push(*fragment);
    }
    for idx in fragments.len()..channels {
        let array = store.create_array(
            grouping,
            &format!("{name}.{idx}"),
            tags::SIGNAL,
            signal.data.channel(idx),
            vec![samples],
            vec![dim0.clone(), Dimension::Set],
        )?;
        store.array_mut(array)?.unit = Some(signal.unit.clone());
        kept.push(array);
    }
    write_shared_metadata(store, &kept, signal, name, parent_section, path, diags)?;
    Ok(kept)
}

/// Fragment groups of a grouping, keyed by shared section identity, in
/// first-appearance (creation) order, each sorted by channel ordinal.
pub fn fragment_groups(
    store: &Store,
    grouping: GroupingId,
) -> Result<Vec<(SectionId, Vec<ArrayId>)>, MapError> {
    let mut groups: Vec<(SectionId, Vec<ArrayId>)> = Vec::new();
    for array_id in &store.grouping(grouping).map_err(MapError::Store)?.arrays {
        let array = store.array(*array_id)?;
        if array.type_tag != tags::SIGNAL {
            continue;
        }
        // Section identity (not value equality) defines the group.
        let Some(section) = array.section else {
            continue;
        };
        match groups.iter_mut().find(|(s, _)| *s == section) {
            Some((_, members)) => members.push(*array_id),
            None => groups.push((section, vec![*array_id])),
        }
    }
    for (_, members) in &mut groups {
        members.sort_by_key(|id| {
            let name = store.array(*id).map(|a| a.name.clone()).unwrap_or_default();
            (channel_ordinal(&name), name)
        });
    }
    Ok(groups)
}

/// Recompose every signal owned by `grouping`.
pub fn read_signals(store: &Store, grouping: GroupingId) -> Result<Vec<Signal>, MapError> {
    let mut signals = Vec::new();
    for (section, members) in fragment_groups(store, grouping)? {
        let first = store.array(members[0])?;
        let time = first.dimensions.first().and_then(time_base_of).ok_or_else(|| {
            MapError::Store(crate::error::StoreError::BadShape {
                shape: first.shape.clone(),
                reason: format!("array {} has no time dimension", first.name),
            })
        })?;
        let columns: Vec<Vec<f64>> = members
            .iter()
            .map(|id| store.array(*id).map(|a| a.data.clone()))
            .collect::<Result<_, _>>()?;
        let (attrs, unnamed) = attrs::read_attrs(store, Entity::Array(members[0]))?;
        let name = if unnamed {
            None
        } else {
            Some(store.section(section)?.name.clone())
        };
        signals.push(Signal {
            name,
            attrs,
            unit: first.unit.clone().unwrap_or_default(),
            data: Payload2d::from_channels(&columns),
            time,
        });
    }
    Ok(signals)
}

/// Declared-name-or-content identity of one fragment group, read back
/// from the store. The comparison key for diffing and linking.
pub fn fragment_group_identity(
    store: &Store,
    section: SectionId,
) -> Result<crate::model::IdentityKey, MapError> {
    use crate::model::IdentityKey;
    if let Some([PropValue::Text(key)]) = store.property(section, props::CONTENT_KEY) {
        return Ok(IdentityKey::Content(key.clone()));
    }
    Ok(IdentityKey::Name(store.section(section)?.name.clone()))
}
