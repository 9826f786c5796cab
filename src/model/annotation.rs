//! Open annotation values carried by every recording-tree entity.
//!
//! The attribute surface of an entity is an explicit schema plus one open
//! map of these values. Scalars and homogeneous one-dimensional lists round
//! trip through the store; quantities and nested containers are rejected by
//! the attribute codec at write time (non-fatal, skip-and-report).

use std::collections::BTreeMap;

/// A single annotation value.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    TextList(Vec<String>),
    BoolList(Vec<bool>),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    /// A physical-quantity value. Not representable as a store property;
    /// rejected by the codec.
    Quantity { value: f64, unit: String },
    /// Nested or heterogeneous container. Rejected by the codec.
    Nested(Vec<AnnotationValue>),
}

/// The open annotation map attached to an entity.
pub type Annotations = BTreeMap<String, AnnotationValue>;

impl AnnotationValue {
    /// Whether the codec can represent this value as a store property.
    pub fn is_storable(&self) -> bool {
        !matches!(
            self,
            AnnotationValue::Quantity { .. } | AnnotationValue::Nested(_)
        )
    }
}

impl From<&str> for AnnotationValue {
    fn from(v: &str) -> Self {
        AnnotationValue::Text(v.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(v: String) -> Self {
        AnnotationValue::Text(v)
    }
}

impl From<bool> for AnnotationValue {
    fn from(v: bool) -> Self {
        AnnotationValue::Bool(v)
    }
}

impl From<i64> for AnnotationValue {
    fn from(v: i64) -> Self {
        AnnotationValue::Int(v)
    }
}

impl From<f64> for AnnotationValue {
    fn from(v: f64) -> Self {
        AnnotationValue::Float(v)
    }
}
