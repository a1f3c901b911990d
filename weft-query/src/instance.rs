//! Materialized records with association slots.

use indexmap::IndexMap;
use serde::Serialize;

use crate::value::{Row, Value};

/// The value held by an association slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Slot {
    /// Single-valued association; `None` when nothing matched.
    One(Option<Box<Instance>>),
    /// Multi-valued association, in storage order; empty when nothing matched.
    Many(Vec<Instance>),
}

impl Slot {
    /// Check whether the slot holds no instance.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(one) => one.is_none(),
            Self::Many(many) => many.is_empty(),
        }
    }

    /// Number of instances held.
    pub fn len(&self) -> usize {
        match self {
            Self::One(one) => usize::from(one.is_some()),
            Self::Many(many) => many.len(),
        }
    }
}

/// One materialized record of an entity type.
///
/// Instances own their nested instances: an instance reached through two
/// parents is two independent copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
    #[serde(skip)]
    entity: String,
    #[serde(skip)]
    primary_key: String,
    #[serde(flatten)]
    attributes: Row,
    #[serde(flatten)]
    associations: IndexMap<String, Slot>,
}

impl Instance {
    /// Create an instance from a raw row.
    pub fn from_row(entity: impl Into<String>, primary_key: impl Into<String>, row: Row) -> Self {
        Self {
            entity: entity.into(),
            primary_key: primary_key.into(),
            attributes: row,
            associations: IndexMap::new(),
        }
    }

    /// Entity type name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Primary key value.
    pub fn id(&self) -> &Value {
        self.get(&self.primary_key)
    }

    /// Attribute value; missing attributes read as `NULL`.
    pub fn get(&self, name: &str) -> &Value {
        self.attributes.get(name).unwrap_or(&crate::value::NULL)
    }

    /// All scalar attributes.
    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// Mutable scalar attributes.
    pub fn attributes_mut(&mut self) -> &mut Row {
        &mut self.attributes
    }

    /// An association slot, if it was included.
    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.associations.get(name)
    }

    /// All populated association slots, in include order.
    pub fn slots(&self) -> &IndexMap<String, Slot> {
        &self.associations
    }

    /// The instance in a single-valued slot.
    pub fn one(&self, name: &str) -> Option<&Instance> {
        match self.associations.get(name) {
            Some(Slot::One(one)) => one.as_deref(),
            _ => None,
        }
    }

    /// The instances in a multi-valued slot; empty if the slot is absent.
    pub fn many(&self, name: &str) -> &[Instance] {
        match self.associations.get(name) {
            Some(Slot::Many(many)) => many,
            _ => &[],
        }
    }

    pub(crate) fn set_slot(&mut self, name: &str, slot: Slot) {
        self.associations.insert(name.to_string(), slot);
    }

    /// Serialize to a JSON object with nested associations.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (name, value) in &self.attributes {
            object.insert(name.clone(), value.to_json());
        }
        for (name, slot) in &self.associations {
            let value = match slot {
                Slot::One(Some(one)) => one.to_json(),
                Slot::One(None) => serde_json::Value::Null,
                Slot::Many(many) => {
                    serde_json::Value::Array(many.iter().map(Instance::to_json).collect())
                }
            };
            object.insert(name.clone(), value);
        }
        serde_json::Value::Object(object)
    }
}
