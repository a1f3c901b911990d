//! Seeding and linking writes.
//!
//! These are thin passthroughs to [`StorageWrite`]; they exist so data can be
//! created and associated through the same registry the read path uses.

use std::future::Future;

use futures::future::try_join_all;
use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::instance::Instance;
use crate::relations::{AssociationKind, IncludeTarget};
use crate::row;
use crate::storage::{BoxFuture, InsertDescriptor, QueryDescriptor, StorageWrite};
use crate::value::{Row, Value};

use super::find::Resolver;

impl<S: StorageWrite> Resolver<S> {
    /// Insert one record and return it with its generated primary key.
    pub async fn create(&self, entity: &str, values: Row) -> QueryResult<Instance> {
        let entity = self.registry().type_of(entity)?.clone();
        let row = self
            .storage()
            .insert(InsertDescriptor {
                entity: entity.name().to_string(),
                table: entity.table_name().to_string(),
                primary_key: Some(entity.primary_key_name().to_string()),
                values,
            })
            .await?;
        Ok(Instance::from_row(entity.name(), entity.primary_key_name(), row))
    }

    /// Insert records one after another, returning them in input order.
    pub async fn bulk_create(&self, entity: &str, rows: Vec<Row>) -> QueryResult<Vec<Instance>> {
        let mut created = Vec::with_capacity(rows.len());
        for values in rows {
            created.push(self.create(entity, values).await?);
        }
        debug!(entity = %entity, count = created.len(), "bulk created");
        Ok(created)
    }

    /// Replace the targets of `source`'s `role` association.
    ///
    /// - many-to-one / one-to-one owning: writes the foreign key on the
    ///   source row (`NULL` when `targets` is empty);
    /// - one-to-one owned / one-to-many: clears the foreign key on rows
    ///   currently pointing at the source, then sets it on the targets;
    /// - many-to-many: deletes the source's join rows, then inserts one join
    ///   row per target, in order.
    ///
    /// `source` itself is not modified; re-read it to observe the change.
    pub async fn set_association(
        &self,
        source: &Instance,
        role: &str,
        targets: &[&Instance],
    ) -> QueryResult<()> {
        let association = self
            .registry()
            .resolve(source.entity(), &IncludeTarget::ByAlias(role.to_string()))?
            .clone();
        let owner = &association.source;
        let target = &association.target;

        if association.kind.is_one() && targets.len() > 1 {
            return Err(QueryError::invalid_assignment(
                owner.name(),
                role,
                format!("single-valued association given {} targets", targets.len()),
            ));
        }
        if let Some(wrong) = targets.iter().find(|t| t.entity() != target.name()) {
            return Err(QueryError::invalid_assignment(
                owner.name(),
                role,
                format!("expected {} but got {}", target.name(), wrong.entity()),
            ));
        }
        let source_key = source.get(association.parent_key()).clone();
        if source_key.is_null() && !association.kind.foreign_key_on_source() {
            return Err(QueryError::invalid_assignment(
                owner.name(),
                role,
                "source record has no key",
            ));
        }

        match association.kind {
            AssociationKind::ManyToOne | AssociationKind::OneToOneOwning => {
                let value = targets
                    .first()
                    .map(|t| t.get(association.child_key()).clone())
                    .unwrap_or(Value::Null);
                let query = QueryDescriptor::new(owner.name(), owner.table_name())
                    .filter(Filter::equals(owner.primary_key_name(), source.id().clone()));
                self.storage()
                    .update(query, row! { association.foreign_key.as_str() => value })
                    .await?;
            }
            AssociationKind::OneToMany | AssociationKind::OneToOneOwned => {
                let fk = association.foreign_key.as_str();
                let clear = QueryDescriptor::new(target.name(), target.table_name())
                    .filter(Filter::equals(fk, source_key.clone()));
                self.storage().update(clear, row! { fk => Value::Null }).await?;

                if !targets.is_empty() {
                    let ids = targets.iter().map(|t| t.id().clone());
                    let set = QueryDescriptor::new(target.name(), target.table_name())
                        .filter(Filter::is_in(target.primary_key_name(), ids));
                    self.storage().update(set, row! { fk => source_key }).await?;
                }
            }
            AssociationKind::ManyToMany => {
                let through = association.through.as_ref().ok_or_else(|| {
                    QueryError::internal(format!("{} has no join record", association.name))
                })?;
                let record = &through.record;
                let clear = QueryDescriptor::new(record.name.as_str(), record.table.as_str())
                    .filter(Filter::equals(through.source_key.as_str(), source_key.clone()));
                self.storage().delete(clear).await?;

                for target_instance in targets {
                    self.storage()
                        .insert(InsertDescriptor {
                            entity: record.name.clone(),
                            table: record.table.clone(),
                            primary_key: None,
                            values: row! {
                                through.source_key.as_str() => source_key.clone(),
                                through.target_key.as_str() => target_instance.id().clone(),
                            },
                        })
                        .await?;
                }
            }
        }

        debug!(
            source = %owner.name(),
            role = %role,
            targets = targets.len(),
            "association set"
        );
        Ok(())
    }
}

/// Independent writes executed concurrently with one combined failure.
///
/// ```rust,ignore
/// let (users, groups) = ([&user], [&group]);
/// let mut batch = WriteBatch::new();
/// batch.push(resolver.set_association(&task, "user", &users));
/// batch.push(resolver.set_association(&user, "group", &groups));
/// batch.run().await?;
/// ```
#[derive(Default)]
pub struct WriteBatch<'a> {
    operations: Vec<BoxFuture<'a, QueryResult<()>>>,
}

impl<'a> WriteBatch<'a> {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation.
    pub fn push<T: Send + 'a>(
        &mut self,
        operation: impl Future<Output = QueryResult<T>> + Send + 'a,
    ) {
        self.operations
            .push(Box::pin(async move { operation.await.map(|_| ()) }));
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Run every operation; the first failure is returned.
    pub async fn run(self) -> QueryResult<()> {
        try_join_all(self.operations).await.map(|_| ())
    }
}

impl std::fmt::Debug for WriteBatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBatch")
            .field("operations", &self.operations.len())
            .finish()
    }
}
