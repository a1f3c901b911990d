//! Association specification types.

use std::sync::Arc;

use crate::schema::EntityType;

/// Kind of association between two entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    /// One-to-one, foreign key on the source (e.g., Task belongs to User).
    OneToOneOwning,
    /// One-to-one, foreign key on the target (e.g., User has one Profile).
    OneToOneOwned,
    /// One-to-many relation (e.g., User has many Tasks).
    OneToMany,
    /// Many-to-one relation (e.g., Task belongs to Project).
    ManyToOne,
    /// Many-to-many relation through a join record (e.g., Product has many Tags).
    ManyToMany,
}

impl AssociationKind {
    /// Check if this association fills a list slot.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    /// Check if this association fills a single-valued slot.
    pub fn is_one(&self) -> bool {
        !self.is_many()
    }

    /// Check if the foreign key lives on the source entity.
    pub fn foreign_key_on_source(&self) -> bool {
        matches!(self, Self::ManyToOne | Self::OneToOneOwning)
    }

    /// Number of storage round-trips one fetch step of this kind performs.
    pub fn round_trips(&self) -> usize {
        match self {
            Self::ManyToMany => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::OneToOneOwning => "one-to-one (owning)",
            Self::OneToOneOwned => "one-to-one (owned)",
            Self::OneToMany => "one-to-many",
            Self::ManyToOne => "many-to-one",
            Self::ManyToMany => "many-to-many",
        };
        f.write_str(name)
    }
}

/// The implicit linking record type backing a many-to-many association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRecord {
    /// Record type name (e.g., `ProductTag`).
    pub name: String,
    /// Storage table name.
    pub table: String,
    /// Foreign key columns, in declaration order.
    pub columns: Vec<String>,
}

impl JoinRecord {
    /// Create a join record with no columns yet.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column unless it is already present.
    pub fn with_column(mut self, column: &str) -> Self {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
        self
    }
}

/// How a many-to-many association reaches its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Through {
    /// The join record.
    pub record: Arc<JoinRecord>,
    /// Join column holding the source key.
    pub source_key: String,
    /// Join column holding the target key.
    pub target_key: String,
}

/// A declared, directed association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Role name; also the slot name on source instances.
    pub name: String,
    /// Association kind.
    pub kind: AssociationKind,
    /// Source entity type.
    pub source: Arc<EntityType>,
    /// Target entity type.
    pub target: Arc<EntityType>,
    /// Column holding the linking value: on the source for owning kinds,
    /// on the target for owned kinds, on the join record for many-to-many.
    pub foreign_key: String,
    /// Join record for many-to-many associations.
    pub through: Option<Through>,
}

impl Association {
    /// Attribute read from parent instances to collect fetch keys.
    pub fn parent_key(&self) -> &str {
        if self.kind.foreign_key_on_source() {
            &self.foreign_key
        } else {
            self.source.primary_key_name()
        }
    }

    /// Attribute on fetched target rows matched against the parent keys.
    ///
    /// For many-to-many this is the target primary key; the join record
    /// columns are available via [`Association::through`].
    pub fn child_key(&self) -> &str {
        match self.kind {
            AssociationKind::OneToMany | AssociationKind::OneToOneOwned => &self.foreign_key,
            _ => self.target.primary_key_name(),
        }
    }

    /// Name of the source entity.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Name of the target entity.
    pub fn target_name(&self) -> &str {
        self.target.name()
    }
}

/// Options overriding the default conventions of a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationOptions {
    /// Role name (`as`).
    pub alias: Option<String>,
    /// Foreign key column.
    pub foreign_key: Option<String>,
    /// Target-side join column for many-to-many.
    pub other_key: Option<String>,
    /// Explicit join record name for many-to-many.
    pub through: Option<String>,
}

impl AssociationOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the role name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the foreign key column.
    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    /// Set the target-side join column.
    pub fn other_key(mut self, column: impl Into<String>) -> Self {
        self.other_key = Some(column.into());
        self
    }

    /// Set the join record name.
    pub fn through(mut self, name: impl Into<String>) -> Self {
        self.through = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn association(kind: AssociationKind, foreign_key: &str) -> Association {
        Association {
            name: "rel".into(),
            kind,
            source: Arc::new(EntityType::new("Task")),
            target: Arc::new(EntityType::new("User")),
            foreign_key: foreign_key.into(),
            through: None,
        }
    }

    #[test]
    fn test_kind_cardinality() {
        assert!(AssociationKind::OneToMany.is_many());
        assert!(AssociationKind::ManyToMany.is_many());
        assert!(AssociationKind::ManyToOne.is_one());
        assert!(AssociationKind::OneToOneOwned.is_one());
        assert_eq!(AssociationKind::ManyToMany.round_trips(), 2);
    }

    #[test]
    fn test_owning_keys() {
        let a = association(AssociationKind::ManyToOne, "UserId");
        assert_eq!(a.parent_key(), "UserId");
        assert_eq!(a.child_key(), "id");
    }

    #[test]
    fn test_owned_keys() {
        let a = association(AssociationKind::OneToMany, "TaskId");
        assert_eq!(a.parent_key(), "id");
        assert_eq!(a.child_key(), "TaskId");
    }

    #[test]
    fn test_join_record_columns_are_unique() {
        let record = JoinRecord::new("ProductTag", "ProductsTags")
            .with_column("ProductId")
            .with_column("TagId")
            .with_column("ProductId");
        assert_eq!(record.columns, vec!["ProductId", "TagId"]);
    }
}
