//! Discrete-series encoding and decoding.
//!
//! Events, intervals, and spike trains all become a tag whose positions
//! array (`<name>.times`) holds the raw instants. Intervals add an
//! extents array (`<name>.durations`), spike trains add the stop/start
//! bounds as section properties and an optional 3-D waveform block as the
//! tag's feature array. Labels travel on the tag itself.
//!
//! The tag's type tag records which series kind it encodes; a kind change
//! on re-sync is a delete-and-recreate, never an in-place mutation.

use crate::error::{Diagnostic, EntityPath, MapError};
use crate::map::{attrs, props, tags};
use crate::model::{DiscreteSeries, IdentityKey, SeriesKind, Waveforms};
use crate::store::{Dimension, Entity, GroupingId, PropValue, SectionId, Store, TagId};
use tracing::debug;

fn positions_name(name: &str) -> String {
    format!("{name}.times")
}

fn extents_name(name: &str) -> String {
    format!("{name}.durations")
}

fn waveforms_name(name: &str) -> String {
    format!("{name}.waveforms")
}

fn waveform_dimensions(wf: &Waveforms) -> Vec<Dimension> {
    vec![
        Dimension::Set,
        Dimension::Set,
        Dimension::Sampled {
            interval: wf.interval,
            offset: 0.0,
            unit: wf.unit.clone(),
            label: "time".to_string(),
        },
    ]
}

fn check_intervals(series: &DiscreteSeries, path: &EntityPath) -> Result<(), MapError> {
    if let SeriesKind::Intervals { times, durations, .. } = &series.kind {
        if durations.len() != times.len() {
            return Err(MapError::MissingRequiredAttribute {
                path: path.clone(),
                attribute: "durations",
            });
        }
    }
    Ok(())
}

/// Whether `tag` encodes the same series kind as `series`, so the diff
/// pass can rewrite it instead of recreating it.
pub fn can_update_in_place(store: &Store, tag: TagId, series: &DiscreteSeries) -> bool {
    store
        .tag(tag)
        .map(|t| t.type_tag == tags::for_series(&series.kind))
        .unwrap_or(false)
}

fn write_time_bounds(
    store: &mut Store,
    tag: TagId,
    series: &DiscreteSeries,
    ctx: &attrs::SectionCtx,
) -> Result<(), MapError> {
    let SeriesKind::SpikeTrain {
        t_start,
        t_stop,
        waveforms,
        ..
    } = &series.kind
    else {
        return Ok(());
    };
    // Spike trains always carry at least the stop bound, so the section
    // is never lazy for them.
    let section = attrs::ensure_section(store, Entity::Tag(tag), ctx)?;
    store.set_property(section, props::T_STOP, vec![PropValue::Float(*t_stop)])?;
    match t_start {
        Some(t) => store.set_property(section, props::T_START, vec![PropValue::Float(*t)])?,
        None => store.remove_property(section, props::T_START)?,
    }
    match waveforms.as_ref().and_then(|wf| wf.left_sweep) {
        Some(sweep) => {
            store.set_property(section, props::LEFT_SWEEP, vec![PropValue::Float(sweep)])?
        }
        None => store.remove_property(section, props::LEFT_SWEEP)?,
    }
    Ok(())
}

fn write_content_key(
    store: &mut Store,
    tag: TagId,
    series: &DiscreteSeries,
    ctx: &attrs::SectionCtx,
) -> Result<(), MapError> {
    if series.name.is_none() {
        let key = hex::encode(crate::map::identity::series_content_key(series));
        let section = attrs::ensure_section(store, Entity::Tag(tag), ctx)?;
        store.set_property(section, props::CONTENT_KEY, vec![PropValue::Text(key)])?;
    } else if let Some(section) = store.section_of(Entity::Tag(tag))? {
        store.remove_property(section, props::CONTENT_KEY)?;
    }
    Ok(())
}

/// Encode `series` as a fresh tag (plus its arrays) under `grouping`.
pub fn write_series(
    store: &mut Store,
    grouping: GroupingId,
    name: &str,
    series: &DiscreteSeries,
    parent_section: SectionId,
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
) -> Result<TagId, MapError> {
    check_intervals(series, path)?;
    let kind_tag = tags::for_series(&series.kind);
    let times = series.kind.times();
    debug!(name, kind = kind_tag, events = times.len(), "encoding series");

    let positions = store.create_array(
        grouping,
        &positions_name(name),
        tags::POSITIONS,
        times.to_vec(),
        vec![times.len()],
        vec![Dimension::Set],
    )?;
    store.array_mut(positions)?.unit = Some(series.kind.unit().to_string());

    let tag = store.create_tag(grouping, name, kind_tag, positions)?;

    match &series.kind {
        SeriesKind::Events { labels, .. } => {
            store.tag_mut(tag)?.labels = labels.clone();
        }
        SeriesKind::Intervals {
            durations, labels, ..
        } => {
            let extents = store.create_array(
                grouping,
                &extents_name(name),
                tags::EXTENTS,
                durations.clone(),
                vec![durations.len()],
                vec![Dimension::Set],
            )?;
            store.array_mut(extents)?.unit = Some(series.kind.unit().to_string());
            store.tag_mut(tag)?.extents = Some(extents);
            store.tag_mut(tag)?.labels = labels.clone();
        }
        SeriesKind::SpikeTrain { waveforms, .. } => {
            if let Some(wf) = waveforms {
                let feature = store.create_array(
                    grouping,
                    &waveforms_name(name),
                    tags::WAVEFORMS,
                    wf.data.clone(),
                    vec![wf.spikes, wf.channels, wf.samples],
                    waveform_dimensions(wf),
                )?;
                store.array_mut(feature)?.unit = Some(wf.unit.clone());
                store.tag_mut(tag)?.feature = Some(feature);
            }
        }
    }

    let ctx = attrs::SectionCtx::new(name, kind_tag).under(parent_section);
    attrs::write_attrs(
        store,
        Entity::Tag(tag),
        &series.attrs,
        series.name.is_none(),
        &ctx,
        path,
        diags,
    )?;
    write_time_bounds(store, tag, series, &ctx)?;
    write_content_key(store, tag, series, &ctx)?;
    Ok(tag)
}

/// Rewrite an existing tag in place. The kind must match
/// (`can_update_in_place`); arrays keep their identities, only their
/// payloads and the tag's labels/properties change.
pub fn update_series(
    store: &mut Store,
    grouping: GroupingId,
    name: &str,
    tag: TagId,
    series: &DiscreteSeries,
    parent_section: SectionId,
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
) -> Result<(), MapError> {
    check_intervals(series, path)?;
    let times = series.kind.times();
    let unit = series.kind.unit().to_string();

    let positions = store.tag(tag)?.positions;
    {
        let array = store.array_mut(positions)?;
        array.data = times.to_vec();
        array.shape = vec![times.len()];
        array.unit = Some(unit.clone());
    }

    match &series.kind {
        SeriesKind::Events { labels, .. } => {
            store.tag_mut(tag)?.labels = labels.clone();
        }
        SeriesKind::Intervals {
            durations, labels, ..
        } => {
            // Same kind on both sides, so the extents array exists.
            let extents = store.tag(tag)?.extents.ok_or_else(|| MapError::DanglingLink {
                path: path.clone(),
                target: extents_name(name),
            })?;
            let array = store.array_mut(extents)?;
            array.data = durations.clone();
            array.shape = vec![durations.len()];
            array.unit = Some(unit);
            store.tag_mut(tag)?.labels = labels.clone();
        }
        SeriesKind::SpikeTrain { waveforms, .. } => {
            let existing = store.tag(tag)?.feature;
            match (existing, waveforms) {
                (Some(feature), Some(wf)) => {
                    let array = store.array_mut(feature)?;
                    array.data = wf.data.clone();
                    array.shape = vec![wf.spikes, wf.channels, wf.samples];
                    array.dimensions = waveform_dimensions(wf);
                    array.unit = Some(wf.unit.clone());
                }
                (Some(feature), None) => {
                    store.tag_mut(tag)?.feature = None;
                    store.detach_array(grouping, feature)?;
                    store.purge_links_to_array(feature)?;
                    store.delete_array(feature)?;
                }
                (None, Some(wf)) => {
                    let feature = store.create_array(
                        grouping,
                        &waveforms_name(name),
                        tags::WAVEFORMS,
                        wf.data.clone(),
                        vec![wf.spikes, wf.channels, wf.samples],
                        waveform_dimensions(wf),
                    )?;
                    store.array_mut(feature)?.unit = Some(wf.unit.clone());
                    store.tag_mut(tag)?.feature = Some(feature);
                }
                (None, None) => {}
            }
        }
    }

    let kind_tag = tags::for_series(&series.kind);
    let ctx = attrs::SectionCtx::new(name, kind_tag).under(parent_section);
    attrs::write_attrs(
        store,
        Entity::Tag(tag),
        &series.attrs,
        series.name.is_none(),
        &ctx,
        path,
        diags,
    )?;
    write_time_bounds(store, tag, series, &ctx)?;
    write_content_key(store, tag, series, &ctx)?;
    Ok(())
}

fn decode_kind(store: &Store, tag: TagId, path: &EntityPath) -> Result<SeriesKind, MapError> {
    let t = store.tag(tag)?;
    let positions = store.array(t.positions)?;
    let times = positions.data.clone();
    let unit = positions.unit.clone().unwrap_or_default();

    match t.type_tag.as_str() {
        tags::INTERVALS => {
            let extents = t.extents.ok_or_else(|| MapError::MissingRequiredAttribute {
                path: path.clone(),
                attribute: "durations",
            })?;
            Ok(SeriesKind::Intervals {
                times,
                durations: store.array(extents)?.data.clone(),
                unit,
                labels: t.labels.clone(),
            })
        }
        tags::SPIKE_TRAIN => {
            let section = store.section_of(Entity::Tag(tag))?;
            let t_stop = section
                .and_then(|s| attrs::single_float(store, s, props::T_STOP))
                .ok_or_else(|| MapError::MissingRequiredAttribute {
                    path: path.clone(),
                    attribute: "t_stop",
                })?;
            let t_start = section.and_then(|s| attrs::single_float(store, s, props::T_START));
            let left_sweep = section.and_then(|s| attrs::single_float(store, s, props::LEFT_SWEEP));
            let waveforms = match t.feature {
                Some(feature) => {
                    let array = store.array(feature)?;
                    let (spikes, channels, samples) = match array.shape.as_slice() {
                        [s, c, n] => (*s, *c, *n),
                        _ => (0, 0, 0),
                    };
                    let interval = match array.dimensions.get(2) {
                        Some(Dimension::Sampled { interval, .. }) => *interval,
                        _ => 0.0,
                    };
                    Some(Waveforms {
                        data: array.data.clone(),
                        spikes,
                        channels,
                        samples,
                        interval,
                        unit: array.unit.clone().unwrap_or_default(),
                        left_sweep,
                    })
                }
                None => None,
            };
            Ok(SeriesKind::SpikeTrain {
                times,
                unit,
                t_start,
                t_stop,
                waveforms,
            })
        }
        // Anything else decodes as plain events.
        _ => Ok(SeriesKind::Events {
            times,
            unit,
            labels: t.labels.clone(),
        }),
    }
}

/// Decode one tag back into a discrete series.
pub fn read_series_tag(
    store: &Store,
    tag: TagId,
    path: &EntityPath,
) -> Result<DiscreteSeries, MapError> {
    let (attrs, unnamed) = attrs::read_attrs(store, Entity::Tag(tag))?;
    let name = if unnamed {
        None
    } else {
        Some(store.tag(tag)?.name.clone())
    };
    let kind = decode_kind(store, tag, path)?;
    Ok(DiscreteSeries { name, attrs, kind })
}

/// Decode every series tag owned by `grouping`, in creation order.
pub fn read_series(
    store: &Store,
    grouping: GroupingId,
    path: &EntityPath,
) -> Result<Vec<DiscreteSeries>, MapError> {
    series_tags(store, grouping)?
        .into_iter()
        .map(|tag| read_series_tag(store, tag, path))
        .collect()
}

/// The grouping's tags that encode series, skipping foreign tags.
pub fn series_tags(store: &Store, grouping: GroupingId) -> Result<Vec<TagId>, MapError> {
    let mut out = Vec::new();
    for tag_id in &store.grouping(grouping)?.tags {
        let tag = store.tag(*tag_id)?;
        if matches!(
            tag.type_tag.as_str(),
            tags::EVENTS | tags::INTERVALS | tags::SPIKE_TRAIN
        ) {
            out.push(*tag_id);
        }
    }
    Ok(out)
}

/// Declared-name-or-content identity of an encoded series, read back
/// from the store.
pub fn series_tag_identity(store: &Store, tag: TagId) -> Result<IdentityKey, MapError> {
    if let Some(section) = store.section_of(Entity::Tag(tag))? {
        if let Some([PropValue::Text(key)]) = store.property(section, props::CONTENT_KEY) {
            return Ok(IdentityKey::Content(key.clone()));
        }
    }
    Ok(IdentityKey::Name(store.tag(tag)?.name.clone()))
}
