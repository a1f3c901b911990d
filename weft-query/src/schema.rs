//! Entity type definitions consumed by the association registry.
//!
//! Model registration proper (validation, hooks, table naming policies)
//! lives outside this crate; an [`EntityType`] is the minimal read-only view
//! the resolver needs.

use indexmap::IndexMap;

use crate::naming;
use crate::value::Value;

/// Semantic type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// 64-bit integer.
    Integer,
    /// Floating point number.
    Real,
    /// UTF-8 text.
    Text,
    /// Boolean.
    Boolean,
    /// Arbitrary JSON document.
    Json,
}

impl AttributeType {
    /// Check whether a value is acceptable for this attribute type.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Self::Integer, Value::Int(_))
                | (Self::Real, Value::Float(_) | Value::Int(_))
                | (Self::Text, Value::String(_))
                | (Self::Boolean, Value::Bool(_) | Value::Int(0 | 1))
                | (Self::Json, _)
        )
    }
}

/// A named schema describing one kind of stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    name: String,
    table: String,
    primary_key: String,
    attributes: IndexMap<String, AttributeType>,
}

impl EntityType {
    /// Create an entity type with the default table name (pluralised) and an
    /// integer `id` primary key.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut attributes = IndexMap::new();
        attributes.insert("id".to_string(), AttributeType::Integer);
        Self {
            table: naming::pluralize(&name),
            name,
            primary_key: "id".to_string(),
            attributes,
        }
    }

    /// Override the table name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Override the primary key attribute.
    pub fn primary_key(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.attributes.shift_remove(&self.primary_key);
        self.primary_key = name.into();
        self.attributes.shift_insert(0, self.primary_key.clone(), ty);
        self
    }

    /// Declare an attribute.
    pub fn attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.attributes.insert(name.into(), ty);
        self
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage table name.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Primary key attribute name.
    pub fn primary_key_name(&self) -> &str {
        &self.primary_key
    }

    /// Declared attributes, primary key first.
    pub fn attributes(&self) -> &IndexMap<String, AttributeType> {
        &self.attributes
    }

    /// Look up an attribute's type.
    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attributes.get(name).copied()
    }
}
