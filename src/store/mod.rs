//! Container-store collaborator.
//!
//! The store knows nothing about recordings. It holds typed n-dimensional
//! arrays with dimension descriptors, lightweight named groupings,
//! hierarchical property sections, and indexed tag objects, all addressed
//! by id newtypes into one arena. Non-containment references live in
//! per-source link tables, orthogonal to ownership.
//!
//! Name uniqueness is enforced per ownership scope at creation time, and a
//! dimension descriptor's kind is fixed once the array exists.

pub mod handle;
pub mod persistence;

pub use handle::StoreHandle;

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub(crate) u64);

        impl $name {
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

entity_id!(ContainerId);
entity_id!(GroupingId);
entity_id!(SourceId);
entity_id!(ArrayId);
entity_id!(TagId);
entity_id!(SectionId);

/// Session mode for `Store::open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ReadOnly,
    ReadWrite,
    /// Discard any existing content at the location.
    Overwrite,
}

/// Root-level container; holds groupings and sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub type_tag: String,
    pub definition: Option<String>,
    pub created_at: Option<i64>,
    pub section: Option<SectionId>,
    pub groupings: Vec<GroupingId>,
    pub sources: Vec<SourceId>,
}

/// Contained by exactly one container; owns arrays and tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grouping {
    pub name: String,
    pub type_tag: String,
    pub definition: Option<String>,
    pub created_at: Option<i64>,
    pub section: Option<SectionId>,
    pub arrays: Vec<ArrayId>,
    pub tags: Vec<TagId>,
}

/// Non-owning hierarchical grouping node with link tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceNode {
    pub name: String,
    pub type_tag: String,
    pub definition: Option<String>,
    pub section: Option<SectionId>,
    pub children: Vec<SourceId>,
    pub array_links: Vec<ArrayId>,
    pub tag_links: Vec<TagId>,
}

/// Dimension descriptor. The kind is fixed at array creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dimension {
    Sampled {
        interval: f64,
        offset: f64,
        unit: String,
        label: String,
    },
    Range {
        ticks: Vec<f64>,
        unit: String,
        label: String,
    },
    Set,
}

/// Flat typed payload plus ordered dimension descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataArray {
    pub name: String,
    pub type_tag: String,
    pub definition: Option<String>,
    pub unit: Option<String>,
    pub data: Vec<f64>,
    pub shape: Vec<usize>,
    pub dimensions: Vec<Dimension>,
    pub section: Option<SectionId>,
}

/// Positions + optional extents + optional linked feature array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub type_tag: String,
    pub definition: Option<String>,
    pub positions: ArrayId,
    pub extents: Option<ArrayId>,
    pub feature: Option<ArrayId>,
    pub labels: Vec<String>,
    pub section: Option<SectionId>,
}

/// Typed property value inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

/// Hierarchical key → typed-value(s) property bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub type_tag: String,
    pub properties: BTreeMap<String, Vec<PropValue>>,
    pub children: Vec<SectionId>,
}

/// Any section-bearing store entity, for generic metadata plumbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Container(ContainerId),
    Grouping(GroupingId),
    Source(SourceId),
    Array(ArrayId),
    Tag(TagId),
}

/// The store arena. One exclusively-held resource per top-level call.
#[derive(Debug)]
pub struct Store {
    mode: Mode,
    backend: Option<persistence::SledBackend>,
    next_id: u64,
    roots: Vec<ContainerId>,
    containers: BTreeMap<u64, Container>,
    groupings: BTreeMap<u64, Grouping>,
    sources: BTreeMap<u64, SourceNode>,
    arrays: BTreeMap<u64, DataArray>,
    tags: BTreeMap<u64, Tag>,
    sections: BTreeMap<u64, Section>,
}

impl Store {
    /// A fresh store with no persistent backing.
    pub fn in_memory() -> Self {
        Store {
            mode: Mode::ReadWrite,
            backend: None,
            next_id: 1,
            roots: Vec::new(),
            containers: BTreeMap::new(),
            groupings: BTreeMap::new(),
            sources: BTreeMap::new(),
            arrays: BTreeMap::new(),
            tags: BTreeMap::new(),
            sections: BTreeMap::new(),
        }
    }

    /// Open (or create) a store at `location`.
    pub fn open(location: impl AsRef<Path>, mode: Mode) -> Result<Self, StoreError> {
        let backend = persistence::SledBackend::open(location)?;
        let mut store = Store::in_memory();
        store.mode = mode;
        match mode {
            Mode::Overwrite => backend.clear()?,
            Mode::ReadOnly | Mode::ReadWrite => backend.load_into(&mut store)?,
        }
        store.backend = Some(backend);
        Ok(store)
    }

    /// Flush to the backend (if any) and release it.
    pub fn close(&mut self) -> Result<(), StoreError> {
        if let Some(backend) = self.backend.take() {
            if self.mode != Mode::ReadOnly {
                backend.flush_from(self)?;
            }
        }
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn writable(&self) -> Result<(), StoreError> {
        if self.mode == Mode::ReadOnly {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn alloc(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_unique<'a>(
        taken: impl Iterator<Item = &'a str>,
        name: &str,
    ) -> Result<(), StoreError> {
        if taken.into_iter().any(|n| n == name) {
            Err(StoreError::NameTaken(name.to_string()))
        } else {
            Ok(())
        }
    }

    // ---- creation ---------------------------------------------------------

    pub fn create_container(&mut self, name: &str, type_tag: &str) -> Result<ContainerId, StoreError> {
        self.writable()?;
        Self::check_unique(
            self.roots.iter().map(|id| self.containers[&id.0].name.as_str()),
            name,
        )?;
        let id = ContainerId(self.alloc());
        self.containers.insert(
            id.0,
            Container {
                name: name.to_string(),
                type_tag: type_tag.to_string(),
                definition: None,
                created_at: None,
                section: None,
                groupings: Vec::new(),
                sources: Vec::new(),
            },
        );
        self.roots.push(id);
        Ok(id)
    }

    pub fn create_grouping(
        &mut self,
        container: ContainerId,
        name: &str,
        type_tag: &str,
    ) -> Result<GroupingId, StoreError> {
        self.writable()?;
        let parent = self.container(container)?;
        Self::check_unique(
            parent
                .groupings
                .iter()
                .map(|id| self.groupings[&id.0].name.as_str()),
            name,
        )?;
        let id = GroupingId(self.alloc());
        self.groupings.insert(
            id.0,
            Grouping {
                name: name.to_string(),
                type_tag: type_tag.to_string(),
                definition: None,
                created_at: None,
                section: None,
                arrays: Vec::new(),
                tags: Vec::new(),
            },
        );
        self.container_mut(container)?.groupings.push(id);
        Ok(id)
    }

    fn insert_source(&mut self, name: &str, type_tag: &str) -> SourceId {
        let id = SourceId(self.alloc());
        self.sources.insert(
            id.0,
            SourceNode {
                name: name.to_string(),
                type_tag: type_tag.to_string(),
                definition: None,
                section: None,
                children: Vec::new(),
                array_links: Vec::new(),
                tag_links: Vec::new(),
            },
        );
        id
    }

    pub fn create_container_source(
        &mut self,
        container: ContainerId,
        name: &str,
        type_tag: &str,
    ) -> Result<SourceId, StoreError> {
        self.writable()?;
        let parent = self.container(container)?;
        Self::check_unique(
            parent.sources.iter().map(|id| self.sources[&id.0].name.as_str()),
            name,
        )?;
        let id = self.insert_source(name, type_tag);
        self.container_mut(container)?.sources.push(id);
        Ok(id)
    }

    pub fn create_child_source(
        &mut self,
        parent: SourceId,
        name: &str,
        type_tag: &str,
    ) -> Result<SourceId, StoreError> {
        self.writable()?;
        let node = self.source(parent)?;
        Self::check_unique(
            node.children.iter().map(|id| self.sources[&id.0].name.as_str()),
            name,
        )?;
        let id = self.insert_source(name, type_tag);
        self.source_mut(parent)?.children.push(id);
        Ok(id)
    }

    pub fn create_array(
        &mut self,
        grouping: GroupingId,
        name: &str,
        type_tag: &str,
        data: Vec<f64>,
        shape: Vec<usize>,
        dimensions: Vec<Dimension>,
    ) -> Result<ArrayId, StoreError> {
        self.writable()?;
        let expected: usize = shape.iter().product();
        if shape.is_empty() || expected != data.len() {
            return Err(StoreError::BadShape {
                shape,
                reason: format!("payload has {} values", data.len()),
            });
        }
        let parent = self.grouping(grouping)?;
        Self::check_unique(
            parent.arrays.iter().map(|id| self.arrays[&id.0].name.as_str()),
            name,
        )?;
        let id = ArrayId(self.alloc());
        self.arrays.insert(
            id.0,
            DataArray {
                name: name.to_string(),
                type_tag: type_tag.to_string(),
                definition: None,
                unit: None,
                data,
                shape,
                dimensions,
                section: None,
            },
        );
        self.grouping_mut(grouping)?.arrays.push(id);
        Ok(id)
    }

    pub fn create_tag(
        &mut self,
        grouping: GroupingId,
        name: &str,
        type_tag: &str,
        positions: ArrayId,
    ) -> Result<TagId, StoreError> {
        self.writable()?;
        self.array(positions)?;
        let parent = self.grouping(grouping)?;
        Self::check_unique(
            parent.tags.iter().map(|id| self.tags[&id.0].name.as_str()),
            name,
        )?;
        let id = TagId(self.alloc());
        self.tags.insert(
            id.0,
            Tag {
                name: name.to_string(),
                type_tag: type_tag.to_string(),
                definition: None,
                positions,
                extents: None,
                feature: None,
                labels: Vec::new(),
                section: None,
            },
        );
        self.grouping_mut(grouping)?.tags.push(id);
        Ok(id)
    }

    pub fn create_section(&mut self, name: &str, type_tag: &str) -> Result<SectionId, StoreError> {
        self.writable()?;
        let id = SectionId(self.alloc());
        self.sections.insert(
            id.0,
            Section {
                name: name.to_string(),
                type_tag: type_tag.to_string(),
                properties: BTreeMap::new(),
                children: Vec::new(),
            },
        );
        Ok(id)
    }

    pub fn create_child_section(
        &mut self,
        parent: SectionId,
        name: &str,
        type_tag: &str,
    ) -> Result<SectionId, StoreError> {
        self.writable()?;
        // Name uniqueness among children holds per type tag; entities of
        // different kinds may share a name, so their sections must too.
        let node = self.section(parent)?;
        Self::check_unique(
            node.children
                .iter()
                .filter(|id| self.sections[&id.0].type_tag == type_tag)
                .map(|id| self.sections[&id.0].name.as_str()),
            name,
        )?;
        let id = self.create_section(name, type_tag)?;
        self.section_mut(parent)?.children.push(id);
        Ok(id)
    }

    pub fn detach_child_section(
        &mut self,
        parent: SectionId,
        child: SectionId,
    ) -> Result<(), StoreError> {
        self.writable()?;
        self.section_mut(parent)?.children.retain(|s| *s != child);
        Ok(())
    }

    // ---- accessors --------------------------------------------------------

    fn missing(kind: &'static str, id: u64) -> StoreError {
        StoreError::NotFound {
            kind,
            name: format!("#{id}"),
        }
    }

    pub fn containers(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.roots.iter().copied()
    }

    pub fn container_by_name(&self, name: &str) -> Option<ContainerId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.containers[&id.0].name == name)
    }

    pub fn container(&self, id: ContainerId) -> Result<&Container, StoreError> {
        self.containers.get(&id.0).ok_or_else(|| Self::missing("container", id.0))
    }

    pub fn container_mut(&mut self, id: ContainerId) -> Result<&mut Container, StoreError> {
        self.containers.get_mut(&id.0).ok_or_else(|| Self::missing("container", id.0))
    }

    pub fn grouping(&self, id: GroupingId) -> Result<&Grouping, StoreError> {
        self.groupings.get(&id.0).ok_or_else(|| Self::missing("grouping", id.0))
    }

    pub fn grouping_mut(&mut self, id: GroupingId) -> Result<&mut Grouping, StoreError> {
        self.groupings.get_mut(&id.0).ok_or_else(|| Self::missing("grouping", id.0))
    }

    pub fn source(&self, id: SourceId) -> Result<&SourceNode, StoreError> {
        self.sources.get(&id.0).ok_or_else(|| Self::missing("source", id.0))
    }

    pub fn source_mut(&mut self, id: SourceId) -> Result<&mut SourceNode, StoreError> {
        self.sources.get_mut(&id.0).ok_or_else(|| Self::missing("source", id.0))
    }

    pub fn array(&self, id: ArrayId) -> Result<&DataArray, StoreError> {
        self.arrays.get(&id.0).ok_or_else(|| Self::missing("array", id.0))
    }

    pub fn array_mut(&mut self, id: ArrayId) -> Result<&mut DataArray, StoreError> {
        self.arrays.get_mut(&id.0).ok_or_else(|| Self::missing("array", id.0))
    }

    pub fn tag(&self, id: TagId) -> Result<&Tag, StoreError> {
        self.tags.get(&id.0).ok_or_else(|| Self::missing("tag", id.0))
    }

    pub fn tag_mut(&mut self, id: TagId) -> Result<&mut Tag, StoreError> {
        self.tags.get_mut(&id.0).ok_or_else(|| Self::missing("tag", id.0))
    }

    pub fn section(&self, id: SectionId) -> Result<&Section, StoreError> {
        self.sections.get(&id.0).ok_or_else(|| Self::missing("section", id.0))
    }

    pub fn section_mut(&mut self, id: SectionId) -> Result<&mut Section, StoreError> {
        self.sections.get_mut(&id.0).ok_or_else(|| Self::missing("section", id.0))
    }

    // ---- generic section / metadata plumbing ------------------------------

    pub fn section_of(&self, entity: Entity) -> Result<Option<SectionId>, StoreError> {
        Ok(match entity {
            Entity::Container(id) => self.container(id)?.section,
            Entity::Grouping(id) => self.grouping(id)?.section,
            Entity::Source(id) => self.source(id)?.section,
            Entity::Array(id) => self.array(id)?.section,
            Entity::Tag(id) => self.tag(id)?.section,
        })
    }

    pub fn set_section(&mut self, entity: Entity, section: SectionId) -> Result<(), StoreError> {
        self.writable()?;
        match entity {
            Entity::Container(id) => self.container_mut(id)?.section = Some(section),
            Entity::Grouping(id) => self.grouping_mut(id)?.section = Some(section),
            Entity::Source(id) => self.source_mut(id)?.section = Some(section),
            Entity::Array(id) => self.array_mut(id)?.section = Some(section),
            Entity::Tag(id) => self.tag_mut(id)?.section = Some(section),
        }
        Ok(())
    }

    pub fn set_definition(&mut self, entity: Entity, definition: Option<String>) -> Result<(), StoreError> {
        self.writable()?;
        match entity {
            Entity::Container(id) => self.container_mut(id)?.definition = definition,
            Entity::Grouping(id) => self.grouping_mut(id)?.definition = definition,
            Entity::Source(id) => self.source_mut(id)?.definition = definition,
            Entity::Array(id) => self.array_mut(id)?.definition = definition,
            Entity::Tag(id) => self.tag_mut(id)?.definition = definition,
        }
        Ok(())
    }

    pub fn definition(&self, entity: Entity) -> Result<Option<String>, StoreError> {
        Ok(match entity {
            Entity::Container(id) => self.container(id)?.definition.clone(),
            Entity::Grouping(id) => self.grouping(id)?.definition.clone(),
            Entity::Source(id) => self.source(id)?.definition.clone(),
            Entity::Array(id) => self.array(id)?.definition.clone(),
            Entity::Tag(id) => self.tag(id)?.definition.clone(),
        })
    }

    /// Creation timestamp (epoch seconds). Only containers and groupings
    /// carry one.
    pub fn set_created_at(&mut self, entity: Entity, at: Option<i64>) -> Result<(), StoreError> {
        self.writable()?;
        match entity {
            Entity::Container(id) => self.container_mut(id)?.created_at = at,
            Entity::Grouping(id) => self.grouping_mut(id)?.created_at = at,
            _ => {}
        }
        Ok(())
    }

    pub fn created_at(&self, entity: Entity) -> Result<Option<i64>, StoreError> {
        Ok(match entity {
            Entity::Container(id) => self.container(id)?.created_at,
            Entity::Grouping(id) => self.grouping(id)?.created_at,
            _ => None,
        })
    }

    pub fn set_property(
        &mut self,
        section: SectionId,
        key: &str,
        values: Vec<PropValue>,
    ) -> Result<(), StoreError> {
        self.writable()?;
        self.section_mut(section)?.properties.insert(key.to_string(), values);
        Ok(())
    }

    pub fn remove_property(&mut self, section: SectionId, key: &str) -> Result<(), StoreError> {
        self.writable()?;
        self.section_mut(section)?.properties.remove(key);
        Ok(())
    }

    pub fn property<'a>(&'a self, section: SectionId, key: &str) -> Option<&'a [PropValue]> {
        self.sections
            .get(&section.0)
            .and_then(|s| s.properties.get(key))
            .map(Vec::as_slice)
    }

    // ---- links ------------------------------------------------------------

    pub fn link_array(&mut self, source: SourceId, array: ArrayId) -> Result<(), StoreError> {
        self.writable()?;
        self.array(array)?;
        let node = self.source_mut(source)?;
        if !node.array_links.contains(&array) {
            node.array_links.push(array);
        }
        Ok(())
    }

    pub fn unlink_array(&mut self, source: SourceId, array: ArrayId) -> Result<(), StoreError> {
        self.writable()?;
        self.source_mut(source)?.array_links.retain(|a| *a != array);
        Ok(())
    }

    pub fn link_tag(&mut self, source: SourceId, tag: TagId) -> Result<(), StoreError> {
        self.writable()?;
        self.tag(tag)?;
        let node = self.source_mut(source)?;
        if !node.tag_links.contains(&tag) {
            node.tag_links.push(tag);
        }
        Ok(())
    }

    pub fn unlink_tag(&mut self, source: SourceId, tag: TagId) -> Result<(), StoreError> {
        self.writable()?;
        self.source_mut(source)?.tag_links.retain(|t| *t != tag);
        Ok(())
    }

    // ---- reachability & removal (used by the synchronizer) ----------------

    fn all_sources(&self) -> impl Iterator<Item = &SourceNode> {
        self.sources.values()
    }

    /// Whether any ownership edge or link still reaches this array.
    /// Whether any grouping owns this array.
    pub fn array_is_owned(&self, array: ArrayId) -> bool {
        self.groupings.values().any(|g| g.arrays.contains(&array))
    }

    pub fn tag_is_owned(&self, tag: TagId) -> bool {
        self.groupings.values().any(|g| g.tags.contains(&tag))
    }

    pub fn array_is_reachable(&self, array: ArrayId) -> bool {
        self.array_is_owned(array)
            || self.all_sources().any(|s| s.array_links.contains(&array))
            || self.tags.values().any(|t| {
                t.positions == array || t.extents == Some(array) || t.feature == Some(array)
            })
    }

    /// Whether any ownership edge or link still reaches this tag.
    pub fn tag_is_reachable(&self, tag: TagId) -> bool {
        self.tag_is_owned(tag) || self.all_sources().any(|s| s.tag_links.contains(&tag))
    }

    /// Whether any entity still uses this section for its metadata. The
    /// section hierarchy itself does not count; a child section whose
    /// entity is gone is collectable even while its parent lists it.
    pub fn section_is_referenced(&self, section: SectionId) -> bool {
        let s = Some(section);
        self.containers.values().any(|c| c.section == s)
            || self.groupings.values().any(|g| g.section == s)
            || self.sources.values().any(|n| n.section == s)
            || self.arrays.values().any(|a| a.section == s)
            || self.tags.values().any(|t| t.section == s)
    }

    /// The section listing `section` as a child, if any.
    pub fn section_parent(&self, section: SectionId) -> Option<SectionId> {
        self.sections
            .iter()
            .find(|(_, s)| s.children.contains(&section))
            .map(|(id, _)| SectionId(*id))
    }

    /// Remove the ownership edge from `grouping` to `array`. The array
    /// itself stays in the arena.
    pub fn detach_array(&mut self, grouping: GroupingId, array: ArrayId) -> Result<(), StoreError> {
        self.writable()?;
        self.grouping_mut(grouping)?.arrays.retain(|a| *a != array);
        Ok(())
    }

    pub fn detach_tag(&mut self, grouping: GroupingId, tag: TagId) -> Result<(), StoreError> {
        self.writable()?;
        self.grouping_mut(grouping)?.tags.retain(|t| *t != tag);
        Ok(())
    }

    /// Remove every link pointing at `array` across all sources.
    pub fn purge_links_to_array(&mut self, array: ArrayId) -> Result<(), StoreError> {
        self.writable()?;
        for node in self.sources.values_mut() {
            node.array_links.retain(|a| *a != array);
        }
        Ok(())
    }

    /// Delete an array outright. Callers run the reachability check first.
    pub fn delete_array(&mut self, array: ArrayId) -> Result<(), StoreError> {
        self.writable()?;
        self.arrays.remove(&array.0).ok_or_else(|| Self::missing("array", array.0))?;
        Ok(())
    }

    pub fn delete_tag(&mut self, tag: TagId) -> Result<(), StoreError> {
        self.writable()?;
        self.tags.remove(&tag.0).ok_or_else(|| Self::missing("tag", tag.0))?;
        Ok(())
    }

    pub fn delete_section(&mut self, section: SectionId) -> Result<(), StoreError> {
        self.writable()?;
        self.sections.remove(&section.0).ok_or_else(|| Self::missing("section", section.0))?;
        Ok(())
    }

    /// Delete a grouping node. Its owned arrays/tags must already have been
    /// detached or deleted by the caller.
    pub fn delete_grouping(&mut self, container: ContainerId, grouping: GroupingId) -> Result<(), StoreError> {
        self.writable()?;
        self.container_mut(container)?.groupings.retain(|g| *g != grouping);
        self.groupings.remove(&grouping.0).ok_or_else(|| Self::missing("grouping", grouping.0))?;
        Ok(())
    }

    /// Delete a source node and, recursively, its child sources. Link
    /// targets are untouched.
    pub fn delete_source(&mut self, container: ContainerId, source: SourceId) -> Result<(), StoreError> {
        self.writable()?;
        self.container_mut(container)?.sources.retain(|s| *s != source);
        self.delete_source_subtree(source)
    }

    fn delete_source_subtree(&mut self, source: SourceId) -> Result<(), StoreError> {
        let node = self.sources.remove(&source.0).ok_or_else(|| Self::missing("source", source.0))?;
        for child in node.children {
            self.delete_source_subtree(child)?;
        }
        Ok(())
    }

    pub fn delete_child_source(&mut self, parent: SourceId, child: SourceId) -> Result<(), StoreError> {
        self.writable()?;
        self.source_mut(parent)?.children.retain(|s| *s != child);
        self.delete_source_subtree(child)
    }

    pub fn delete_container(&mut self, container: ContainerId) -> Result<(), StoreError> {
        self.writable()?;
        self.roots.retain(|c| *c != container);
        self.containers.remove(&container.0).ok_or_else(|| Self::missing("container", container.0))?;
        Ok(())
    }

    /// Snapshot of live array ids, for sweep-style iteration while mutating.
    pub fn array_ids(&self) -> Vec<ArrayId> {
        self.arrays.keys().map(|k| ArrayId(*k)).collect()
    }

    pub fn tag_ids(&self) -> Vec<TagId> {
        self.tags.keys().map(|k| TagId(*k)).collect()
    }

    pub fn section_ids(&self) -> Vec<SectionId> {
        self.sections.keys().map(|k| SectionId(*k)).collect()
    }

    /// Total number of live entities, used by idempotency tests and the CLI.
    pub fn entity_count(&self) -> usize {
        self.containers.len()
            + self.groupings.len()
            + self.sources.len()
            + self.arrays.len()
            + self.tags.len()
            + self.sections.len()
    }
}
