//! Diff-based tree synchronization (the write path).
//!
//! A depth-first walk of the recording tree with, per sibling scope, a
//! three-way diff against the store: desired children found by identity
//! key are updated in place, missing ones are created, and store children
//! no longer desired are detached. Detached leaves become orphan
//! candidates; they are deleted only at the end of the pass, after group
//! links have settled, and only if nothing reaches them anymore.
//!
//! Name resolution runs over the desired siblings (not the store), so
//! re-running an unchanged write resolves identical names and converges
//! without creating duplicates.
//!
//! Failure of a structural store operation aborts the smallest enclosing
//! subtree with path context; nothing written for siblings is rolled
//! back.

use crate::error::{Diagnostic, EntityKind, EntityPath, MapError};
use crate::map::{attrs, identity, links, series, signal, tags};
use crate::model::{
    Cluster, DiscreteSeries, Group, IdentityKey, Recording, Signal, SubRecording,
};
use crate::store::{
    ArrayId, ContainerId, Entity, GroupingId, SectionId, SourceId, Store, TagId,
};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// Leaves detached during the pass. They stay in the arena until links
/// have settled, so a group that keeps its reference keeps the object.
#[derive(Debug, Default)]
struct Orphans {
    arrays: Vec<ArrayId>,
    tags: Vec<TagId>,
}

/// Delete everything no ownership edge or link reaches anymore. Runs
/// once at the end of a pass; tags go first so arrays they alone kept
/// alive fall in the same sweep, then sections their entities vacated.
fn collect_unreachable(store: &mut Store) -> Result<(), MapError> {
    for tag in store.tag_ids() {
        if !store.tag_is_reachable(tag) {
            store.delete_tag(tag)?;
        }
    }
    for array in store.array_ids() {
        if !store.array_is_reachable(array) {
            store.delete_array(array)?;
        }
    }
    for section in store.section_ids() {
        if store.section(section).is_ok() && !store.section_is_referenced(section) {
            if let Some(parent) = store.section_parent(section) {
                store.detach_child_section(parent, section)?;
            }
            store.delete_section(section)?;
        }
    }
    Ok(())
}

/// Resolved sibling scope: deterministic store names for one kind.
fn resolve_scope<'a, T>(
    children: &'a [T],
    kind: EntityKind,
    name_of: impl Fn(&T) -> Option<&str>,
) -> Result<Vec<(String, &'a T)>, MapError> {
    let mut taken = BTreeSet::new();
    let mut out = Vec::with_capacity(children.len());
    for (ordinal, child) in children.iter().enumerate() {
        let name = identity::resolve_name(name_of(child), kind, ordinal, &taken)?;
        taken.insert(name.clone());
        out.push((name, child));
    }
    Ok(out)
}

/// Write `recording` into the store, creating or updating its container.
///
/// Returns the container id and the non-fatal diagnostics gathered along
/// the way.
#[instrument(skip_all, fields(recording = recording.name.as_deref().unwrap_or("<unnamed>")))]
pub fn sync_recording(
    store: &mut Store,
    recording: &Recording,
) -> Result<(ContainerId, Vec<Diagnostic>), MapError> {
    let name = identity::resolve_name(
        recording.name.as_deref(),
        EntityKind::Recording,
        0,
        &BTreeSet::new(),
    )?;
    let path = EntityPath::root(EntityKind::Recording, &name);
    let mut diags = Vec::new();

    let container = match store.container_by_name(&name) {
        Some(existing) => {
            debug!(container = %name, "updating existing container");
            existing
        }
        None => {
            debug!(container = %name, "creating container");
            store
                .create_container(&name, tags::RECORDING)
                .map_err(|e| MapError::Store(e).at(path.clone()))?
        }
    };

    let ctx = attrs::SectionCtx::new(&name, tags::METADATA);
    attrs::write_attrs(
        store,
        Entity::Container(container),
        &recording.attrs,
        recording.name.is_none(),
        &ctx,
        &path,
        &mut diags,
    )?;
    // Child sections nest under the container's, so it is structural.
    let root_section = attrs::ensure_section(store, Entity::Container(container), &ctx)
        .map_err(|e| MapError::Store(e).at(path.clone()))?;

    let mut orphans = Orphans::default();
    sync_sub_recordings(
        store,
        container,
        root_section,
        &recording.sub_recordings,
        &path,
        &mut diags,
        &mut orphans,
    )?;
    sync_groups(
        store,
        container,
        root_section,
        &recording.groups,
        &path,
        &mut diags,
        &orphans,
    )?;
    collect_unreachable(store)?;

    info!(
        container = %name,
        entities = store.entity_count(),
        diagnostics = diags.len(),
        "synchronized recording"
    );
    Ok((container, diags))
}

fn sync_sub_recordings(
    store: &mut Store,
    container: ContainerId,
    root_section: SectionId,
    subs: &[SubRecording],
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
    orphans: &mut Orphans,
) -> Result<(), MapError> {
    let desired = resolve_scope(subs, EntityKind::SubRecording, |s| s.name.as_deref())?;

    let existing: Vec<(String, GroupingId)> = store
        .container(container)?
        .groupings
        .iter()
        .filter_map(|id| {
            let g = store.grouping(*id).ok()?;
            (g.type_tag == tags::SUB_RECORDING).then(|| (g.name.clone(), *id))
        })
        .collect();

    for (name, sub) in &desired {
        let sub_path = path.child(EntityKind::SubRecording, name);
        let grouping = match existing.iter().find(|(n, _)| n == name) {
            Some((_, id)) => *id,
            None => store
                .create_grouping(container, name, tags::SUB_RECORDING)
                .map_err(|e| MapError::Store(e).at(sub_path.clone()))?,
        };
        // Sections carry the entity's own type tag: a sub-recording and
        // a group may legally share a name, and their sections sit under
        // the same root.
        let ctx = attrs::SectionCtx::new(name, tags::SUB_RECORDING).under(root_section);
        attrs::write_attrs(
            store,
            Entity::Grouping(grouping),
            &sub.attrs,
            sub.name.is_none(),
            &ctx,
            &sub_path,
            diags,
        )?;
        // Signal and series sections nest under this one.
        let section = attrs::ensure_section(store, Entity::Grouping(grouping), &ctx)
            .map_err(|e| MapError::Store(e).at(sub_path.clone()))?;

        sync_signals(store, grouping, section, &sub.signals, &sub_path, diags, orphans)?;
        let items = sub.series.to_vec().map_err(|e| e.at(sub_path.clone()))?;
        sync_series(store, grouping, section, &items, &sub_path, diags, orphans)?;
    }

    for (name, grouping) in existing {
        if desired.iter().any(|(n, _)| *n == name) {
            continue;
        }
        debug!(sub_recording = %name, "removing sub-recording");
        remove_grouping(store, container, grouping, orphans)?;
    }
    Ok(())
}

fn remove_grouping(
    store: &mut Store,
    container: ContainerId,
    grouping: GroupingId,
    orphans: &mut Orphans,
) -> Result<(), MapError> {
    let (arrays, grouping_tags) = {
        let g = store.grouping(grouping)?;
        (g.arrays.clone(), g.tags.clone())
    };
    for tag in grouping_tags {
        store.detach_tag(grouping, tag)?;
        orphans.tags.push(tag);
    }
    for array in arrays {
        store.detach_array(grouping, array)?;
        orphans.arrays.push(array);
    }
    store.delete_grouping(container, grouping)?;
    Ok(())
}

/// Desired identity of one signal: declared (resolved) name, or content
/// key when the source carries no name.
fn signal_key(signal: &Signal, resolved: &str) -> IdentityKey {
    if signal.name.is_none() {
        IdentityKey::Content(hex::encode(identity::signal_content_key(signal)))
    } else {
        IdentityKey::Name(resolved.to_string())
    }
}

fn series_key(series: &DiscreteSeries, resolved: &str) -> IdentityKey {
    if series.name.is_none() {
        IdentityKey::Content(hex::encode(identity::series_content_key(series)))
    } else {
        IdentityKey::Name(resolved.to_string())
    }
}

fn sync_signals(
    store: &mut Store,
    grouping: GroupingId,
    parent_section: SectionId,
    signals: &[Signal],
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
    orphans: &mut Orphans,
) -> Result<(), MapError> {
    let desired = resolve_scope(signals, EntityKind::Signal, |s| s.name.as_deref())?;
    let desired: Vec<(IdentityKey, String, &Signal)> = desired
        .into_iter()
        .map(|(name, sig)| (signal_key(sig, &name), name, sig))
        .collect();

    let mut existing: Vec<(IdentityKey, SectionId, Vec<ArrayId>)> = Vec::new();
    for (section, members) in signal::fragment_groups(store, grouping)? {
        existing.push((
            signal::fragment_group_identity(store, section)?,
            section,
            members,
        ));
    }

    // Detach groups that disappeared before creating anything, freeing
    // their fragment names for reuse within this scope.
    let mut matched: BTreeSet<SectionId> = BTreeSet::new();
    for (key, _, sig) in &desired {
        if let Some((_, section, members)) = existing.iter().find(|(k, _, _)| k == key) {
            if signal::can_update_in_place(store, members, sig) {
                matched.insert(*section);
            }
        }
    }
    for (_, section, members) in &existing {
        if matched.contains(section) {
            continue;
        }
        for member in members {
            store.detach_array(grouping, *member)?;
            orphans.arrays.push(*member);
        }
        // The stale shared section leaves the hierarchy too, so a
        // recreate under the same parent can reuse the name. It lives
        // on as long as its fragments do.
        if store.section_parent(*section) == Some(parent_section) {
            store.detach_child_section(parent_section, *section)?;
        }
    }

    let mut seen: BTreeSet<IdentityKey> = BTreeSet::new();
    for (key, name, sig) in &desired {
        // Payload-equal unnamed siblings share a content key and map to
        // one store object; the first occurrence wins.
        if !seen.insert(key.clone()) {
            continue;
        }
        let sig_path = path.child(EntityKind::Signal, name);
        match existing.iter().find(|(k, s, _)| k == key && matched.contains(s)) {
            Some((_, section, members)) => {
                // Fragment names derive from the stored base name, which
                // for content-keyed signals may predate this pass.
                let base = store.section(*section)?.name.clone();
                signal::update_signal(
                    store, grouping, &base, members, sig, parent_section, &sig_path, diags,
                )
                .map_err(|e| e.at(sig_path.clone()))?;
            }
            None => {
                signal::write_signal(store, grouping, name, sig, parent_section, &sig_path, diags)
                    .map_err(|e| e.at(sig_path.clone()))?;
            }
        }
    }
    Ok(())
}

fn sync_series(
    store: &mut Store,
    grouping: GroupingId,
    parent_section: SectionId,
    items: &[DiscreteSeries],
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
    orphans: &mut Orphans,
) -> Result<(), MapError> {
    let desired = resolve_scope(items, EntityKind::Series, |s| s.name.as_deref())?;
    let desired: Vec<(IdentityKey, String, &DiscreteSeries)> = desired
        .into_iter()
        .map(|(name, s)| (series_key(s, &name), name, s))
        .collect();

    let mut existing: Vec<(IdentityKey, TagId)> = Vec::new();
    for tag in series::series_tags(store, grouping)? {
        existing.push((series::series_tag_identity(store, tag)?, tag));
    }

    let mut matched: BTreeSet<TagId> = BTreeSet::new();
    for (key, _, item) in &desired {
        if let Some((_, tag)) = existing.iter().find(|(k, _)| k == key) {
            if series::can_update_in_place(store, *tag, item) {
                matched.insert(*tag);
            }
        }
    }
    for (_, tag) in &existing {
        if matched.contains(tag) {
            continue;
        }
        let (positions, extents, feature) = {
            let t = store.tag(*tag)?;
            (t.positions, t.extents, t.feature)
        };
        store.detach_tag(grouping, *tag)?;
        orphans.tags.push(*tag);
        for array in [Some(positions), extents, feature].into_iter().flatten() {
            store.detach_array(grouping, array)?;
            orphans.arrays.push(array);
        }
        // Same as with signals: the stale section steps out of the
        // hierarchy so a recreated series can take its name.
        if let Some(section) = store.section_of(Entity::Tag(*tag))? {
            if store.section_parent(section) == Some(parent_section) {
                store.detach_child_section(parent_section, section)?;
            }
        }
    }

    let mut seen: BTreeSet<IdentityKey> = BTreeSet::new();
    for (key, name, item) in &desired {
        if !seen.insert(key.clone()) {
            continue;
        }
        let item_path = path.child(EntityKind::Series, name);
        match existing.iter().find(|(k, t)| k == key && matched.contains(t)) {
            Some((_, tag)) => {
                let base = store.tag(*tag)?.name.clone();
                series::update_series(
                    store, grouping, &base, *tag, item, parent_section, &item_path, diags,
                )
                .map_err(|e| e.at(item_path.clone()))?;
            }
            None => {
                series::write_series(
                    store, grouping, name, item, parent_section, &item_path, diags,
                )
                .map_err(|e| e.at(item_path.clone()))?;
            }
        }
    }
    Ok(())
}

fn sync_groups(
    store: &mut Store,
    container: ContainerId,
    root_section: SectionId,
    groups: &[Group],
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
    orphans: &Orphans,
) -> Result<(), MapError> {
    // Built after leaf sync so every desired reference target exists.
    // Detached leaves stay resolvable: a group that keeps its reference
    // keeps the object alive, unowned.
    let mut index = links::ContainerIndex::build(store, container)?;
    index.include_detached_arrays(store, &orphans.arrays)?;
    index.include_detached_tags(store, &orphans.tags)?;
    let desired = resolve_scope(groups, EntityKind::Group, |g| g.name.as_deref())?;

    let existing: Vec<(String, SourceId)> = store
        .container(container)?
        .sources
        .iter()
        .filter_map(|id| {
            let s = store.source(*id).ok()?;
            (s.type_tag == tags::GROUP).then(|| (s.name.clone(), *id))
        })
        .collect();

    for (name, group) in &desired {
        let group_path = path.child(EntityKind::Group, name);
        let source = match existing.iter().find(|(n, _)| n == name) {
            Some((_, id)) => *id,
            None => store
                .create_container_source(container, name, tags::GROUP)
                .map_err(|e| MapError::Store(e).at(group_path.clone()))?,
        };
        let ctx = attrs::SectionCtx::new(name, tags::GROUP).under(root_section);
        attrs::write_attrs(
            store,
            Entity::Source(source),
            &group.attrs,
            group.name.is_none(),
            &ctx,
            &group_path,
            diags,
        )?;
        links::sync_signal_links(store, &index, source, &group.signals, &group_path, diags)
            .map_err(|e| e.at(group_path.clone()))?;

        // Cluster sections nest under the group's, so it turns structural
        // as soon as clusters exist.
        let cluster_parent = if group.clusters.is_empty() {
            root_section
        } else {
            attrs::ensure_section(store, Entity::Source(source), &ctx)
                .map_err(|e| MapError::Store(e).at(group_path.clone()))?
        };
        sync_clusters(
            store,
            &index,
            source,
            cluster_parent,
            &group.clusters,
            &group_path,
            diags,
        )?;
    }

    for (name, source) in existing {
        if desired.iter().any(|(n, _)| *n == name) {
            continue;
        }
        debug!(group = %name, "removing group");
        store.delete_source(container, source)?;
    }
    Ok(())
}

fn sync_clusters(
    store: &mut Store,
    index: &links::ContainerIndex,
    parent: SourceId,
    parent_section: SectionId,
    clusters: &[Cluster],
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
) -> Result<(), MapError> {
    let desired = resolve_scope(clusters, EntityKind::Cluster, |c| c.name.as_deref())?;

    let existing: Vec<(String, SourceId)> = store
        .source(parent)?
        .children
        .iter()
        .filter_map(|id| {
            let s = store.source(*id).ok()?;
            (s.type_tag == tags::CLUSTER).then(|| (s.name.clone(), *id))
        })
        .collect();

    for (name, cluster) in &desired {
        let cluster_path = path.child(EntityKind::Cluster, name);
        let source = match existing.iter().find(|(n, _)| n == name) {
            Some((_, id)) => *id,
            None => store
                .create_child_source(parent, name, tags::CLUSTER)
                .map_err(|e| MapError::Store(e).at(cluster_path.clone()))?,
        };
        let ctx = attrs::SectionCtx::new(name, tags::CLUSTER).under(parent_section);
        attrs::write_attrs(
            store,
            Entity::Source(source),
            &cluster.attrs,
            cluster.name.is_none(),
            &ctx,
            &cluster_path,
            diags,
        )?;
        links::sync_train_links(store, index, source, &cluster.trains, &cluster_path, diags)
            .map_err(|e| e.at(cluster_path.clone()))?;
    }

    for (name, source) in existing {
        if desired.iter().any(|(n, _)| *n == name) {
            continue;
        }
        store.delete_child_source(parent, source)?;
    }
    Ok(())
}
