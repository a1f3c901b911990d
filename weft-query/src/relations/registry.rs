//! The association registry.
//!
//! A [`Registry`] is an explicit value holding every registered
//! [`EntityType`] and the associations declared between them. It is built
//! once, then shared read-only (`Arc<Registry>`) by any number of concurrent
//! resolution runs.
//!
//! ```rust
//! use weft_query::{EntityType, Registry, IncludeTarget};
//!
//! let mut registry = Registry::new();
//! registry.register(EntityType::new("User"))?;
//! registry.register(EntityType::new("Task"))?;
//! registry.belongs_to("Task", "User")?;
//! registry.has_many("User", "Task")?;
//!
//! let assoc = registry.resolve("Task", &IncludeTarget::ByType("User".into()))?;
//! assert_eq!(assoc.name, "user");
//! assert_eq!(assoc.foreign_key, "UserId");
//! # Ok::<(), weft_query::QueryError>(())
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::naming;
use crate::schema::EntityType;

use super::include::IncludeTarget;
use super::spec::{Association, AssociationKind, AssociationOptions, JoinRecord, Through};

/// Registry of entity types and their associations.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: IndexMap<String, Arc<EntityType>>,
    associations: IndexMap<String, Vec<Arc<Association>>>,
    join_records: IndexMap<String, Arc<JoinRecord>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type. Entity types are immutable once registered.
    pub fn register(&mut self, entity: EntityType) -> QueryResult<Arc<EntityType>> {
        if self.entities.contains_key(entity.name()) {
            return Err(QueryError::invalid_configuration(format!(
                "entity type {} is already registered",
                entity.name()
            )));
        }
        let entity = Arc::new(entity);
        self.entities.insert(entity.name().to_string(), entity.clone());
        Ok(entity)
    }

    /// Look up a registered entity type.
    pub fn type_of(&self, name: &str) -> QueryResult<&Arc<EntityType>> {
        self.entities
            .get(name)
            .ok_or_else(|| QueryError::unknown_entity(name))
    }

    /// Check if an entity type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// All registered entity types, in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.entities.values()
    }

    /// Associations declared on `source`, in declaration order.
    pub fn associations_of(&self, source: &str) -> &[Arc<Association>] {
        self.associations
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All join records created by many-to-many declarations.
    pub fn join_records(&self) -> impl Iterator<Item = &Arc<JoinRecord>> {
        self.join_records.values()
    }

    /// Declare an association.
    ///
    /// Declaring a role that already exists on `source` replaces the
    /// previous declaration.
    pub fn declare(
        &mut self,
        source: &str,
        target: &str,
        kind: AssociationKind,
        options: AssociationOptions,
    ) -> QueryResult<Arc<Association>> {
        let source = self.type_of(source)?.clone();
        let target = self.type_of(target)?.clone();

        let name = options.alias.clone().unwrap_or_else(|| match kind {
            k if k.is_many() => naming::many_role(target.name()),
            _ => naming::single_role(target.name()),
        });

        let (foreign_key, through) = match kind {
            AssociationKind::ManyToOne | AssociationKind::OneToOneOwning => {
                let fk = options.foreign_key.clone().unwrap_or_else(|| {
                    naming::foreign_key(options.alias.as_deref().unwrap_or(target.name()))
                });
                (fk, None)
            }
            AssociationKind::OneToMany | AssociationKind::OneToOneOwned => {
                let fk = options
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| naming::foreign_key(source.name()));
                (fk, None)
            }
            AssociationKind::ManyToMany => {
                let through = self.join_record_for(&source, &target, &name, &options);
                (through.source_key.clone(), Some(through))
            }
        };

        let association = Arc::new(Association {
            name,
            kind,
            source: source.clone(),
            target,
            foreign_key,
            through,
        });

        debug!(
            source = %association.source_name(),
            target = %association.target_name(),
            role = %association.name,
            kind = %association.kind,
            "declared association"
        );

        let declared = self.associations.entry(source.name().to_string()).or_default();
        match declared.iter_mut().find(|a| a.name == association.name) {
            Some(existing) => *existing = association.clone(),
            None => declared.push(association.clone()),
        }
        Ok(association)
    }

    /// Create or reuse the join record for a many-to-many declaration.
    fn join_record_for(
        &mut self,
        source: &EntityType,
        target: &EntityType,
        role: &str,
        options: &AssociationOptions,
    ) -> Through {
        let (first, second) = if source.name() <= target.name() {
            (source, target)
        } else {
            (target, source)
        };
        let record_name = options
            .through
            .clone()
            .unwrap_or_else(|| format!("{}{}", first.name(), second.name()));

        let source_key = options
            .foreign_key
            .clone()
            .unwrap_or_else(|| naming::foreign_key(source.name()));
        let target_key = options.other_key.clone().unwrap_or_else(|| {
            if source.name() == target.name() {
                naming::foreign_key(&naming::singularize(role))
            } else {
                naming::foreign_key(target.name())
            }
        });

        let record = match self.join_records.get(&record_name) {
            Some(existing) => (**existing).clone(),
            None => JoinRecord::new(
                record_name.clone(),
                format!("{}{}", first.table_name(), second.table_name()),
            ),
        };
        let record = Arc::new(record.with_column(&source_key).with_column(&target_key));
        self.join_records.insert(record_name, record.clone());

        Through {
            record,
            source_key,
            target_key,
        }
    }

    /// Declare a many-to-one association (`source` holds `{Target}Id`).
    pub fn belongs_to(&mut self, source: &str, target: &str) -> QueryResult<Arc<Association>> {
        self.declare(source, target, AssociationKind::ManyToOne, AssociationOptions::default())
    }

    /// Declare a one-to-one owned association (`target` holds `{Source}Id`).
    pub fn has_one(&mut self, source: &str, target: &str) -> QueryResult<Arc<Association>> {
        self.declare(source, target, AssociationKind::OneToOneOwned, AssociationOptions::default())
    }

    /// Declare a one-to-many association (`target` holds `{Source}Id`).
    pub fn has_many(&mut self, source: &str, target: &str) -> QueryResult<Arc<Association>> {
        self.declare(source, target, AssociationKind::OneToMany, AssociationOptions::default())
    }

    /// Declare a many-to-many association through the default join record.
    pub fn belongs_to_many(&mut self, source: &str, target: &str) -> QueryResult<Arc<Association>> {
        self.declare(source, target, AssociationKind::ManyToMany, AssociationOptions::default())
    }

    /// Resolve an include target on `source` to a concrete association.
    pub fn resolve(&self, source: &str, target: &IncludeTarget) -> QueryResult<&Arc<Association>> {
        self.type_of(source)?;
        let declared = self.associations_of(source);

        match target {
            IncludeTarget::ByAlias(alias) => declared
                .iter()
                .find(|a| &a.name == alias)
                .ok_or_else(|| QueryError::unknown_association(source, alias.as_str())),
            IncludeTarget::ByType(model) => {
                if !self.contains(model) {
                    return Err(QueryError::invalid_include(format!(
                        "Include on {} names {}, which is neither a registered model nor an alias",
                        source, model
                    ))
                    .with_model(source)
                    .with_association(model.as_str()));
                }
                let candidates: Vec<&Arc<Association>> = declared
                    .iter()
                    .filter(|a| a.target_name() == model)
                    .collect();
                match candidates.as_slice() {
                    [] => Err(QueryError::unknown_association(source, model.as_str())),
                    [only] => Ok(*only),
                    many => {
                        let roles: Vec<&str> = many.iter().map(|a| a.name.as_str()).collect();
                        Err(QueryError::ambiguous_include(source, model.as_str(), &roles))
                    }
                }
            }
        }
    }
}
