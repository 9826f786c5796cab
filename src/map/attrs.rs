//! Attribute codec: entity attributes ↔ store sections.
//!
//! A fixed set of direct attributes (description, origin, timestamps) maps
//! to reserved `strata:`-prefixed properties or entity fields; everything
//! in the open annotation map is written verbatim under its own key.
//! Sections are created lazily, on the first property that actually needs
//! one. Unsupported annotation values are skipped and reported, never
//! fatal.
//!
//! Scalar/sequence conversion follows the store's multi-valued property
//! model: a one-element property reads back as a scalar, a multi-element
//! property as a sequence. Empty sequences have no typed representation
//! and are skipped like unsupported values.

use crate::error::{Diagnostic, EntityPath, MapError, StoreError};
use crate::map::props;
use crate::model::{AnnotationValue, Annotations, Attrs};
use crate::store::{Entity, PropValue, SectionId, Store};
use chrono::{DateTime, TimeZone, Utc};

/// Where to create an entity's section if one becomes necessary.
#[derive(Debug, Clone)]
pub struct SectionCtx {
    pub name: String,
    pub type_tag: String,
    pub parent: Option<SectionId>,
}

impl SectionCtx {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        SectionCtx {
            name: name.into(),
            type_tag: type_tag.into(),
            parent: None,
        }
    }

    pub fn under(mut self, parent: SectionId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Fetch the entity's section, creating and attaching it on first use.
pub fn ensure_section(
    store: &mut Store,
    entity: Entity,
    ctx: &SectionCtx,
) -> Result<SectionId, StoreError> {
    if let Some(section) = store.section_of(entity)? {
        return Ok(section);
    }
    let section = match ctx.parent {
        Some(parent) => store.create_child_section(parent, &ctx.name, &ctx.type_tag)?,
        None => store.create_section(&ctx.name, &ctx.type_tag)?,
    };
    store.set_section(entity, section)?;
    Ok(section)
}

/// Convert one annotation value to store property values, or explain why
/// it cannot be represented.
fn to_props(value: &AnnotationValue) -> Result<Vec<PropValue>, &'static str> {
    let values = match value {
        AnnotationValue::Text(v) => vec![PropValue::Text(v.clone())],
        AnnotationValue::Bool(v) => vec![PropValue::Bool(*v)],
        AnnotationValue::Int(v) => vec![PropValue::Int(*v)],
        AnnotationValue::Float(v) => vec![PropValue::Float(*v)],
        AnnotationValue::TextList(vs) => vs.iter().cloned().map(PropValue::Text).collect(),
        AnnotationValue::BoolList(vs) => vs.iter().copied().map(PropValue::Bool).collect(),
        AnnotationValue::IntList(vs) => vs.iter().copied().map(PropValue::Int).collect(),
        AnnotationValue::FloatList(vs) => vs.iter().copied().map(PropValue::Float).collect(),
        AnnotationValue::Quantity { .. } => {
            return Err("physical-quantity values are not representable as properties")
        }
        AnnotationValue::Nested(_) => {
            return Err("nested or heterogeneous containers are not representable as properties")
        }
    };
    if values.is_empty() {
        return Err("empty sequences have no typed property representation");
    }
    Ok(values)
}

/// Convert property values back to one annotation value.
fn from_props(values: &[PropValue]) -> Option<AnnotationValue> {
    match values {
        [] => None,
        [PropValue::Text(v)] => Some(AnnotationValue::Text(v.clone())),
        [PropValue::Bool(v)] => Some(AnnotationValue::Bool(*v)),
        [PropValue::Int(v)] => Some(AnnotationValue::Int(*v)),
        [PropValue::Float(v)] => Some(AnnotationValue::Float(*v)),
        [PropValue::Text(_), ..] => Some(AnnotationValue::TextList(
            values
                .iter()
                .filter_map(|v| match v {
                    PropValue::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect(),
        )),
        [PropValue::Bool(_), ..] => Some(AnnotationValue::BoolList(
            values
                .iter()
                .filter_map(|v| match v {
                    PropValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect(),
        )),
        [PropValue::Int(_), ..] => Some(AnnotationValue::IntList(
            values
                .iter()
                .filter_map(|v| match v {
                    PropValue::Int(i) => Some(*i),
                    _ => None,
                })
                .collect(),
        )),
        [PropValue::Float(_), ..] => Some(AnnotationValue::FloatList(
            values
                .iter()
                .filter_map(|v| match v {
                    PropValue::Float(f) => Some(*f),
                    _ => None,
                })
                .collect(),
        )),
    }
}

pub(crate) fn single_int(store: &Store, section: SectionId, key: &str) -> Option<i64> {
    match store.property(section, key) {
        Some([PropValue::Int(v)]) => Some(*v),
        _ => None,
    }
}

pub(crate) fn single_text(store: &Store, section: SectionId, key: &str) -> Option<String> {
    match store.property(section, key) {
        Some([PropValue::Text(v)]) => Some(v.clone()),
        _ => None,
    }
}

pub(crate) fn single_float(store: &Store, section: SectionId, key: &str) -> Option<f64> {
    match store.property(section, key) {
        Some([PropValue::Float(v)]) => Some(*v),
        _ => None,
    }
}

fn epoch_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

fn carries_entity_timestamp(entity: Entity) -> bool {
    matches!(entity, Entity::Container(_) | Entity::Grouping(_))
}

/// Write an entity's direct attributes and annotations.
///
/// Updates in place: properties present from a previous pass but absent
/// from `attrs` are removed, so a re-sync converges on the source state.
pub fn write_attrs(
    store: &mut Store,
    entity: Entity,
    attrs: &Attrs,
    unnamed: bool,
    ctx: &SectionCtx,
    path: &EntityPath,
    diags: &mut Vec<Diagnostic>,
) -> Result<(), MapError> {
    store.set_definition(entity, attrs.description.clone())?;

    // Creation time truncates to whole seconds either way.
    let created_secs = attrs.created_at.map(|t| t.timestamp());
    if carries_entity_timestamp(entity) {
        store.set_created_at(entity, created_secs)?;
    }

    // Desired reserved properties.
    let mut desired: Vec<(&str, Vec<PropValue>)> = Vec::new();
    if let Some(origin) = &attrs.origin {
        desired.push((props::ORIGIN, vec![PropValue::Text(origin.clone())]));
    }
    if let Some(at) = attrs.source_time {
        desired.push((props::SOURCE_TIME, vec![PropValue::Int(at.timestamp())]));
    }
    if let (Some(secs), false) = (created_secs, carries_entity_timestamp(entity)) {
        desired.push((props::CREATED_AT, vec![PropValue::Int(secs)]));
    }
    if unnamed {
        desired.push((props::UNNAMED, vec![PropValue::Bool(true)]));
    }

    // Open annotations, verbatim keys.
    let mut annotation_props: Vec<(String, Vec<PropValue>)> = Vec::new();
    for (key, value) in &attrs.annotations {
        if key.starts_with(props::RESERVED_PREFIX) {
            diags.push(Diagnostic {
                path: path.clone(),
                message: format!("annotation key {key:?} uses the reserved prefix; skipped"),
            });
            continue;
        }
        match to_props(value) {
            Ok(values) => annotation_props.push((key.clone(), values)),
            Err(reason) => diags.push(Diagnostic {
                path: path.clone(),
                message: format!("unsupported annotation {key:?}: {reason}"),
            }),
        }
    }

    // Nothing to store and no section yet: stay lazy.
    let existing = store.section_of(entity)?;
    if existing.is_none() && desired.is_empty() && annotation_props.is_empty() {
        return Ok(());
    }
    let section = ensure_section(store, entity, ctx)?;

    // Drop properties from a previous pass that no longer apply. Only the
    // reserved keys this codec owns are candidates; the content key and
    // the series time-bound properties belong to other writers.
    const OWNED: [&str; 4] = [
        props::ORIGIN,
        props::SOURCE_TIME,
        props::CREATED_AT,
        props::UNNAMED,
    ];
    let stale: Vec<String> = store
        .section(section)
        .map_err(MapError::Store)?
        .properties
        .keys()
        .filter(|key| {
            if key.starts_with(props::RESERVED_PREFIX) {
                OWNED.contains(&key.as_str()) && !desired.iter().any(|(k, _)| k == key)
            } else {
                !annotation_props.iter().any(|(k, _)| k == key.as_str())
            }
        })
        .cloned()
        .collect();
    for key in stale {
        store.remove_property(section, &key)?;
    }

    for (key, values) in desired {
        store.set_property(section, key, values)?;
    }
    for (key, values) in annotation_props {
        store.set_property(section, &key, values)?;
    }
    Ok(())
}

/// Read back an entity's attributes. The second value reports whether the
/// entity was auto-named on write (its source name was absent).
pub fn read_attrs(store: &Store, entity: Entity) -> Result<(Attrs, bool), StoreError> {
    let mut attrs = Attrs {
        description: store.definition(entity)?,
        ..Attrs::default()
    };
    if let Some(secs) = store.created_at(entity)? {
        attrs.created_at = epoch_to_datetime(secs);
    }

    let mut unnamed = false;
    if let Some(section) = store.section_of(entity)? {
        attrs.origin = single_text(store, section, props::ORIGIN);
        if let Some(secs) = single_int(store, section, props::SOURCE_TIME) {
            attrs.source_time = epoch_to_datetime(secs);
        }
        if attrs.created_at.is_none() {
            if let Some(secs) = single_int(store, section, props::CREATED_AT) {
                attrs.created_at = epoch_to_datetime(secs);
            }
        }
        unnamed = matches!(
            store.property(section, props::UNNAMED),
            Some([PropValue::Bool(true)])
        );

        let mut annotations = Annotations::new();
        for (key, values) in &store.section(section)?.properties {
            if key.starts_with(props::RESERVED_PREFIX) {
                continue;
            }
            if let Some(value) = from_props(values) {
                annotations.insert(key.clone(), value);
            }
        }
        attrs.annotations = annotations;
    }
    Ok((attrs, unnamed))
}
