//! Reference linking.
//!
//! Groups and clusters hold non-owning references, expressed in the store
//! as link-table edges on source nodes. Linking never copies a payload
//! and never deletes an object: this module only adds and removes edges.
//!
//! Targets are found through a container-wide identity index, since a
//! group may reference signals from any sub-recording of its recording.
//! A key matching more than one object resolves to the first match in
//! creation order and reports the ambiguity; a key matching nothing is a
//! dangling reference and fails the sync.

use crate::error::{Diagnostic, EntityPath, MapError};
use crate::map::{series, signal, tags};
use crate::model::IdentityKey;
use crate::store::{ArrayId, ContainerId, SourceId, Store, TagId};
use std::collections::BTreeSet;

/// Identity-keyed view of every linkable object in one container.
///
/// Built once per sync or read pass; the store is not mutated between
/// construction and use within a pass, except through this module's own
/// link edits, which do not move or rename objects.
#[derive(Debug)]
pub struct ContainerIndex {
    /// One entry per decomposed signal: identity plus its fragment set.
    signals: Vec<(IdentityKey, Vec<ArrayId>)>,
    /// One entry per encoded spike train.
    trains: Vec<(IdentityKey, TagId)>,
}

impl ContainerIndex {
    pub fn build(store: &Store, container: ContainerId) -> Result<Self, MapError> {
        let mut signals = Vec::new();
        let mut trains = Vec::new();
        for grouping in &store.container(container)?.groupings {
            for (section, members) in signal::fragment_groups(store, *grouping)? {
                signals.push((signal::fragment_group_identity(store, section)?, members));
            }
            for tag in series::series_tags(store, *grouping)? {
                if store.tag(tag)?.type_tag == tags::SPIKE_TRAIN {
                    trains.push((series::series_tag_identity(store, tag)?, tag));
                }
            }
        }
        Ok(ContainerIndex { signals, trains })
    }

    /// Add detached signal fragments (grouped by their shared section) so
    /// a group may keep referencing a signal whose owner dropped it.
    pub fn include_detached_arrays(
        &mut self,
        store: &Store,
        arrays: &[ArrayId],
    ) -> Result<(), MapError> {
        let mut groups: Vec<(crate::store::SectionId, Vec<ArrayId>)> = Vec::new();
        for id in arrays {
            let Ok(array) = store.array(*id) else { continue };
            if array.type_tag != tags::SIGNAL {
                continue;
            }
            let Some(section) = array.section else { continue };
            match groups.iter_mut().find(|(s, _)| *s == section) {
                Some((_, members)) => members.push(*id),
                None => groups.push((section, vec![*id])),
            }
        }
        for (section, members) in groups {
            self.signals
                .push((signal::fragment_group_identity(store, section)?, members));
        }
        Ok(())
    }

    pub fn include_detached_tags(&mut self, store: &Store, tags_in: &[TagId]) -> Result<(), MapError> {
        for id in tags_in {
            let Ok(tag) = store.tag(*id) else { continue };
            if tag.type_tag != tags::SPIKE_TRAIN {
                continue;
            }
            self.trains.push((series::series_tag_identity(store, *id)?, *id));
        }
        Ok(())
    }

    /// Add every signal fragment and spike train no grouping owns. Link
    /// edges outlive ownership, so reconstruction resolves them here.
    pub fn include_unowned(&mut self, store: &Store) -> Result<(), MapError> {
        let arrays: Vec<ArrayId> = store
            .array_ids()
            .into_iter()
            .filter(|id| !store.array_is_owned(*id))
            .collect();
        self.include_detached_arrays(store, &arrays)?;
        let unowned_tags: Vec<TagId> = store
            .tag_ids()
            .into_iter()
            .filter(|id| !store.tag_is_owned(*id))
            .collect();
        self.include_detached_tags(store, &unowned_tags)
    }

    /// All fragment sets matching `key`, in creation order.
    fn signal_matches(&self, key: &IdentityKey) -> Vec<&Vec<ArrayId>> {
        self.signals
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, members)| members)
            .collect()
    }

    fn train_matches(&self, key: &IdentityKey) -> Vec<TagId> {
        self.trains
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, tag)| *tag)
            .collect()
    }

    /// Identity of the signal owning `array`, if the array is a signal
    /// fragment known to this index.
    pub fn signal_identity_of(&self, array: ArrayId) -> Option<&IdentityKey> {
        self.signals
            .iter()
            .find(|(_, members)| members.contains(&array))
            .map(|(key, _)| key)
    }

    pub fn train_identity_of(&self, tag: TagId) -> Option<&IdentityKey> {
        self.trains
            .iter()
            .find(|(_, t)| *t == tag)
            .map(|(key, _)| key)
    }
}

fn ambiguity(path: &EntityPath, key: &IdentityKey, count: usize) -> Diagnostic {
    Diagnostic {
        path: path.clone(),
        message: format!("reference {key} matches {count} objects; linking the first"),
    }
}

/// Make `source`'s array links equal the fragments of the signals named
/// by `desired`, touching only link edges.
pub fn sync_signal_links(
    store: &mut Store,
    index: &ContainerIndex,
    source: SourceId,
    desired: &[IdentityKey],
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
) -> Result<(), MapError> {
    let mut wanted: BTreeSet<ArrayId> = BTreeSet::new();
    for key in desired {
        let matches = index.signal_matches(key);
        match matches.first() {
            None => {
                return Err(MapError::DanglingLink {
                    path: path.clone(),
                    target: key.to_string(),
                })
            }
            Some(members) => {
                if matches.len() > 1 {
                    diags.push(ambiguity(path, key, matches.len()));
                }
                wanted.extend(members.iter().copied());
            }
        }
    }

    let existing: Vec<ArrayId> = store.source(source)?.array_links.clone();
    for array in existing {
        if !wanted.remove(&array) {
            store.unlink_array(source, array)?;
        }
    }
    for array in wanted {
        store.link_array(source, array)?;
    }
    Ok(())
}

/// Make `source`'s tag links equal the spike trains named by `desired`.
pub fn sync_train_links(
    store: &mut Store,
    index: &ContainerIndex,
    source: SourceId,
    desired: &[IdentityKey],
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
) -> Result<(), MapError> {
    let mut wanted: BTreeSet<TagId> = BTreeSet::new();
    for key in desired {
        let matches = index.train_matches(key);
        match matches.first() {
            None => {
                return Err(MapError::DanglingLink {
                    path: path.clone(),
                    target: key.to_string(),
                })
            }
            Some(tag) => {
                if matches.len() > 1 {
                    diags.push(ambiguity(path, key, matches.len()));
                }
                wanted.insert(*tag);
            }
        }
    }

    let existing: Vec<TagId> = store.source(source)?.tag_links.clone();
    for tag in existing {
        if !wanted.remove(&tag) {
            store.unlink_tag(source, tag)?;
        }
    }
    for tag in wanted {
        store.link_tag(source, tag)?;
    }
    Ok(())
}

/// Read back the signal identities linked from `source`, one key per
/// referenced signal regardless of its channel count.
pub fn linked_signal_keys(
    store: &Store,
    index: &ContainerIndex,
    source: SourceId,
) -> Result<Vec<IdentityKey>, MapError> {
    let mut keys: Vec<IdentityKey> = Vec::new();
    for array in &store.source(source)?.array_links {
        if let Some(key) = index.signal_identity_of(*array) {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    Ok(keys)
}

pub fn linked_train_keys(
    store: &Store,
    index: &ContainerIndex,
    source: SourceId,
) -> Result<Vec<IdentityKey>, MapError> {
    let mut keys: Vec<IdentityKey> = Vec::new();
    for tag in &store.source(source)?.tag_links {
        if let Some(key) = index.train_identity_of(*tag) {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    Ok(keys)
}
