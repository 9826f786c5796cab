//! Tree reconstruction (the read path).
//!
//! Walks one container and rebuilds the recording tree: groupings become
//! sub-recordings with their signals recomposed and series decoded,
//! sources become groups and clusters with their link tables turned back
//! into identity-key references.
//!
//! Large series sets come back as lazy collections holding a clone of the
//! session handle; the deferred load runs against whatever session state
//! it finds, applying the configured stale-handle policy.

use crate::config::{MapperConfig, OnStale};
use crate::error::{EntityKind, EntityPath, MapError, StoreError};
use crate::map::{attrs, links, series, signal, tags};
use crate::model::{Cluster, DiscreteSeries, Group, Recording, SeriesCollection, SubRecording};
use crate::store::{ContainerId, Entity, GroupingId, Store, StoreHandle};
use tracing::{debug, instrument};

/// Read one recording by its container name.
#[instrument(skip(handle, config))]
pub fn read_recording(
    handle: &StoreHandle,
    config: &MapperConfig,
    name: &str,
) -> Result<Recording, MapError> {
    handle.with_store(|store| {
        let container = store
            .container_by_name(name)
            .ok_or_else(|| StoreError::NotFound {
                kind: "container",
                name: name.to_string(),
            })?;
        Ok(read_container(store, handle, config, container))
    })?
}

/// Read every recording in the store, in root order.
pub fn read_all(handle: &StoreHandle, config: &MapperConfig) -> Result<Vec<Recording>, MapError> {
    let containers = handle.with_store(|store| Ok(store.containers().collect::<Vec<_>>()))?;
    containers
        .into_iter()
        .map(|container| {
            handle.with_store(|store| Ok(read_container(store, handle, config, container)))?
        })
        .collect()
}

fn read_container(
    store: &Store,
    handle: &StoreHandle,
    config: &MapperConfig,
    container: ContainerId,
) -> Result<Recording, MapError> {
    let root = store.container(container)?;
    let (root_attrs, unnamed) = attrs::read_attrs(store, Entity::Container(container))?;
    let path = EntityPath::root(EntityKind::Recording, &root.name);

    let mut sub_recordings = Vec::new();
    for grouping in &root.groupings {
        let g = store.grouping(*grouping)?;
        if g.type_tag != tags::SUB_RECORDING {
            continue;
        }
        let sub_path = path.child(EntityKind::SubRecording, &g.name);
        let (sub_attrs, sub_unnamed) = attrs::read_attrs(store, Entity::Grouping(*grouping))?;
        let signals = signal::read_signals(store, *grouping)?;
        let series = read_series_collection(store, handle, config, *grouping, &sub_path)?;
        sub_recordings.push(SubRecording {
            name: (!sub_unnamed).then(|| g.name.clone()),
            attrs: sub_attrs,
            signals,
            series,
        });
    }

    let mut index = links::ContainerIndex::build(store, container)?;
    // Groups may still link leaves their former owner dropped.
    index.include_unowned(store)?;
    let mut groups = Vec::new();
    for source in &root.sources {
        let s = store.source(*source)?;
        if s.type_tag != tags::GROUP {
            continue;
        }
        let (group_attrs, group_unnamed) = attrs::read_attrs(store, Entity::Source(*source))?;
        let signals = links::linked_signal_keys(store, &index, *source)?;

        let mut clusters = Vec::new();
        for child in &s.children {
            let c = store.source(*child)?;
            if c.type_tag != tags::CLUSTER {
                continue;
            }
            let (cluster_attrs, cluster_unnamed) =
                attrs::read_attrs(store, Entity::Source(*child))?;
            clusters.push(Cluster {
                name: (!cluster_unnamed).then(|| c.name.clone()),
                attrs: cluster_attrs,
                trains: links::linked_train_keys(store, &index, *child)?,
            });
        }

        groups.push(Group {
            name: (!group_unnamed).then(|| s.name.clone()),
            attrs: group_attrs,
            signals,
            clusters,
        });
    }

    Ok(Recording {
        name: (!unnamed).then(|| root.name.clone()),
        attrs: root_attrs,
        sub_recordings,
        groups,
    })
}

/// Eager below the threshold, deferred at or above it.
fn read_series_collection(
    store: &Store,
    handle: &StoreHandle,
    config: &MapperConfig,
    grouping: GroupingId,
    path: &EntityPath,
) -> Result<SeriesCollection, MapError> {
    let count = series::series_tags(store, grouping)?.len();
    if count < config.lazy_threshold {
        return Ok(SeriesCollection::loaded(series::read_series(
            store, grouping, path,
        )?));
    }

    debug!(series = count, "deferring series load");
    let handle = handle.clone();
    let on_stale = config.on_stale;
    let path = path.clone();
    Ok(SeriesCollection::lazy(Box::new(move || {
        load_deferred(&handle, on_stale, grouping, &path)
    })))
}

fn load_deferred(
    handle: &StoreHandle,
    on_stale: OnStale,
    grouping: GroupingId,
    path: &EntityPath,
) -> Result<Vec<DiscreteSeries>, MapError> {
    let attempt = |handle: &StoreHandle| {
        handle.with_store(|store| Ok(series::read_series(store, grouping, path)))
    };
    match attempt(handle) {
        Ok(result) => result,
        Err(StoreError::Closed) => match on_stale {
            OnStale::Fail => Err(MapError::StaleHandle),
            OnStale::Reopen => {
                handle.reopen_read_only()?;
                attempt(handle)?
            }
        },
        Err(other) => Err(other.into()),
    }
}
