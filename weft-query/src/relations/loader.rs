//! Batched fetching of include steps.
//!
//! Each step issues one query for all of its parents at once (two for
//! many-to-many), keyed by the distinct linking values of the parent set.

use tracing::debug;

use crate::error::QueryResult;
use crate::filter::{distinct_keys, Filter};
use crate::storage::{QueryDescriptor, Storage};
use crate::value::{Row, Value};

use super::plan::PlannedStep;
use super::spec::AssociationKind;

/// Rows fetched for one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched {
    /// Target rows, in storage order.
    pub rows: Vec<Row>,
    /// Join rows for many-to-many steps, in storage order.
    pub through: Vec<Row>,
}

impl Fetched {
    /// Check if nothing was fetched.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.through.is_empty()
    }
}

/// Loader executing include steps against a storage backend.
pub struct RelationLoader<'s, S: Storage + ?Sized> {
    storage: &'s S,
}

impl<'s, S: Storage + ?Sized> RelationLoader<'s, S> {
    /// Create a loader over `storage`.
    pub fn new(storage: &'s S) -> Self {
        Self { storage }
    }

    /// Distinct non-null linking values of `parents` for `step`, in first-seen order.
    pub fn parent_keys<'r>(
        step: &PlannedStep,
        parents: impl IntoIterator<Item = &'r Row>,
    ) -> Vec<Value> {
        distinct_keys(parents, step.association.parent_key())
    }

    /// Build the query reading the step's target rows for `keys`.
    pub fn build_target_query(step: &PlannedStep, keys: Vec<Value>) -> QueryDescriptor {
        let association = &step.association;
        let target = &association.target;
        let key_column = match association.kind {
            AssociationKind::ManyToMany => target.primary_key_name(),
            _ => association.child_key(),
        };
        QueryDescriptor::new(target.name(), target.table_name())
            .filter(Filter::is_in(key_column, keys))
            .filter(step.filter.clone())
    }

    /// Build the join record query of a many-to-many step, if it is one.
    pub fn build_through_query(step: &PlannedStep, keys: Vec<Value>) -> Option<QueryDescriptor> {
        let through = step.association.through.as_ref()?;
        Some(
            QueryDescriptor::new(through.record.name.as_str(), through.record.table.as_str())
                .filter(Filter::is_in(through.source_key.as_str(), keys)),
        )
    }

    /// Fetch the rows of `step` for the given parent keys.
    ///
    /// No query is issued when `keys` is empty. Storage failures propagate
    /// unchanged.
    pub async fn load(&self, step: &PlannedStep, keys: Vec<Value>) -> QueryResult<Fetched> {
        if keys.is_empty() {
            debug!(path = %step.path, "no parent keys, skipping include step");
            return Ok(Fetched::default());
        }
        let key_count = keys.len();

        let fetched = match Self::build_through_query(step, keys.clone()) {
            Some(join_query) => {
                let through = self.storage.execute(join_query).await?;
                let target_keys = step
                    .association
                    .through
                    .as_ref()
                    .map(|t| distinct_keys(&through, &t.target_key))
                    .unwrap_or_default();
                let rows = if target_keys.is_empty() {
                    Vec::new()
                } else {
                    self.storage
                        .execute(Self::build_target_query(step, target_keys))
                        .await?
                };
                Fetched { rows, through }
            }
            None => Fetched {
                rows: self.storage.execute(Self::build_target_query(step, keys)).await?,
                through: Vec::new(),
            },
        };

        debug!(
            path = %step.path,
            kind = %step.association.kind,
            keys = key_count,
            rows = fetched.rows.len(),
            join_rows = fetched.through.len(),
            "fetched include step"
        );
        crate::weft_debug!(path = %step.path, rows = ?fetched.rows, "include step rows");
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::relations::include::include;
    use crate::relations::plan::IncludePlan;
    use crate::relations::registry::Registry;
    use crate::row;
    use crate::schema::EntityType;
    use crate::storage::MemoryStore;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        for name in ["User", "Task", "Product", "Tag"] {
            registry.register(EntityType::new(name)).unwrap();
        }
        registry.belongs_to("Task", "User").unwrap();
        registry.has_many("User", "Task").unwrap();
        registry.belongs_to_many("Product", "Tag").unwrap();
        registry
    }

    fn step(root: &str, model: &str) -> PlannedStep {
        let config = ResolverConfig::default();
        let plan = IncludePlan::build(&registry(), root, &[include(model)], &config).unwrap();
        plan.steps()[0].clone()
    }

    #[test]
    fn test_many_to_one_queries_target_primary_key() {
        let step = step("Task", "User");
        let parents = vec![
            row! { "id" => 1, "UserId" => 5 },
            row! { "id" => 2, "UserId" => 5 },
            row! { "id" => 3, "UserId" => Value::Null },
        ];
        let keys = RelationLoader::<MemoryStore>::parent_keys(&step, &parents);
        assert_eq!(keys, vec![Value::Int(5)]);

        let query = RelationLoader::<MemoryStore>::build_target_query(&step, keys);
        assert_eq!(query.table, "Users");
        assert_eq!(query.filter, Filter::is_in("id", vec![Value::Int(5)]));
    }

    #[test]
    fn test_one_to_many_queries_foreign_key() {
        let step = step("User", "Task");
        let parents = vec![row! { "id" => 1 }, row! { "id" => 2 }];
        let keys = RelationLoader::<MemoryStore>::parent_keys(&step, &parents);
        let query = RelationLoader::<MemoryStore>::build_target_query(&step, keys);
        assert_eq!(query.table, "Tasks");
        assert_eq!(
            query.filter,
            Filter::is_in("UserId", vec![Value::Int(1), Value::Int(2)])
        );
        assert!(RelationLoader::<MemoryStore>::build_through_query(&step, vec![]).is_none());
    }

    #[tokio::test]
    async fn test_empty_keys_issue_no_query() {
        let store = MemoryStore::new();
        let loader = RelationLoader::new(&store);
        let fetched = loader.load(&step("Task", "User"), vec![]).await.unwrap();
        assert!(fetched.is_empty());
        assert_eq!(store.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_many_to_many_two_phase() {
        let store = MemoryStore::new();
        store.seed(
            "ProductsTags",
            vec![
                row! { "ProductId" => 1, "TagId" => 10 },
                row! { "ProductId" => 1, "TagId" => 11 },
                row! { "ProductId" => 2, "TagId" => 10 },
            ],
        );
        store.seed("Tags", vec![row! { "id" => 10 }, row! { "id" => 11 }, row! { "id" => 12 }]);

        let loader = RelationLoader::new(&store);
        let fetched = loader
            .load(&step("Product", "Tag"), vec![Value::Int(1), Value::Int(2)])
            .await
            .unwrap();
        assert_eq!(fetched.through.len(), 3);
        assert_eq!(fetched.rows.len(), 2);
        assert_eq!(store.round_trips(), 2);

        let queries = store.queries();
        assert_eq!(queries[0].table, "ProductsTags");
        assert_eq!(
            queries[1].filter,
            Filter::is_in("id", vec![Value::Int(10), Value::Int(11)])
        );
    }

    #[tokio::test]
    async fn test_many_to_many_without_join_rows_skips_target() {
        let store = MemoryStore::new();
        let loader = RelationLoader::new(&store);
        let fetched = loader
            .load(&step("Product", "Tag"), vec![Value::Int(3)])
            .await
            .unwrap();
        assert!(fetched.is_empty());
        assert_eq!(store.round_trips(), 1);
    }

    #[tokio::test]
    async fn test_storage_error_propagates() {
        let store = MemoryStore::new();
        store.fail_table("Users");
        let loader = RelationLoader::new(&store);
        let err = loader
            .load(&step("Task", "User"), vec![Value::Int(1)])
            .await
            .unwrap_err();
        assert!(err.is_storage_error());
    }
}
