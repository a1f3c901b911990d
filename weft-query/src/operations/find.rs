//! The `find` entry point.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::config::ResolverConfig;
use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::instance::Instance;
use crate::relations::{
    GraphAssembler, IncludePlan, IncludeSpec, PlannedStep, Registry, RelationLoader,
};
use crate::storage::{QueryDescriptor, Storage};

/// Options of a `find` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Filter on the root rows.
    pub filter: Filter,
    /// Include tree, one entry per root-level include.
    pub include: Vec<IncludeSpec>,
    /// Maximum number of root rows.
    pub take: Option<u64>,
}

impl FindOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter condition on the root rows.
    pub fn r#where(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = std::mem::take(&mut self.filter).and_then(filter.into());
        self
    }

    /// Include an association of the root.
    pub fn include(mut self, spec: IncludeSpec) -> Self {
        self.include.push(spec);
        self
    }

    /// Take a limited number of root rows.
    pub fn take(mut self, n: u64) -> Self {
        self.take = Some(n);
        self
    }
}

/// Resolves root queries with their include trees against a storage backend.
///
/// ```rust
/// use std::sync::Arc;
/// use weft_query::prelude::*;
/// # futures::executor::block_on(async {
///
/// let mut registry = Registry::new();
/// registry.register(EntityType::new("User"))?;
/// registry.register(EntityType::new("Task"))?;
/// registry.belongs_to("Task", "User")?;
///
/// let store = MemoryStore::new();
/// store.seed("Users", vec![row! { "id" => 1, "name" => "Ann" }]);
/// store.seed("Tasks", vec![row! { "id" => 1, "UserId" => 1 }]);
///
/// let resolver = Resolver::new(Arc::new(registry), store);
/// let tasks = resolver
///     .find("Task", FindOptions::new().include(IncludeSpec::model("User")))
///     .await?;
/// assert_eq!(tasks[0].one("user").unwrap().get("name").as_str(), Some("Ann"));
/// # Ok::<(), QueryError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Resolver<S> {
    registry: Arc<Registry>,
    storage: S,
    config: ResolverConfig,
}

impl<S> Resolver<S> {
    /// Create a resolver with the default configuration.
    pub fn new(registry: Arc<Registry>, storage: S) -> Self {
        Self {
            registry,
            storage,
            config: ResolverConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// The registry used for planning.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The active configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Validate and compile an include tree without touching storage.
    pub fn plan(&self, root: &str, include: &[IncludeSpec]) -> QueryResult<IncludePlan> {
        IncludePlan::build(&self.registry, root, include, &self.config)
    }
}

impl<S: Storage> Resolver<S> {
    /// Start a fluent find on `root`.
    pub fn query(&self, root: impl Into<String>) -> FindOperation<'_, S> {
        FindOperation {
            resolver: self,
            root: root.into(),
            options: FindOptions::default(),
        }
    }

    /// Fetch the root rows matching `options.filter` together with every
    /// included association.
    ///
    /// The include tree is validated before any I/O. Either the complete
    /// graph is returned or the first error; partial graphs are discarded.
    #[instrument(skip(self, options), fields(includes = options.include.len()))]
    pub async fn find(&self, root: &str, options: FindOptions) -> QueryResult<Vec<Instance>> {
        let plan = self.plan(root, &options.include)?;
        self.execute(&plan, options.filter, options.take).await
    }

    /// Fetch at most one root instance.
    ///
    /// The root query is limited to one row in storage before required
    /// includes are applied. If that row fails a required include the
    /// result is `None`, even when later root rows would have matched.
    pub async fn find_one(
        &self,
        root: &str,
        options: FindOptions,
    ) -> QueryResult<Option<Instance>> {
        let options = FindOptions {
            take: Some(1),
            ..options
        };
        Ok(self.find(root, options).await?.into_iter().next())
    }

    /// Like [`find_one`](Self::find_one), failing with
    /// [`ErrorCode::RecordNotFound`](crate::error::ErrorCode::RecordNotFound)
    /// when nothing matched.
    pub async fn find_one_or_fail(
        &self,
        root: &str,
        options: FindOptions,
    ) -> QueryResult<Instance> {
        self.find_one(root, options)
            .await?
            .ok_or_else(|| QueryError::not_found(root))
    }

    /// Run a compiled plan.
    pub async fn execute(
        &self,
        plan: &IncludePlan,
        filter: Filter,
        take: Option<u64>,
    ) -> QueryResult<Vec<Instance>> {
        let root = plan.root();
        let rows = self
            .storage
            .execute(
                QueryDescriptor::new(root.name(), root.table_name())
                    .filter(filter)
                    .limit(take),
            )
            .await?;
        debug!(root = %root.name(), rows = rows.len(), steps = plan.len(), "fetched root rows");

        let mut assembler = GraphAssembler::new(plan, rows, self.config.single_match);
        let loader = RelationLoader::new(&self.storage);

        for level in plan.levels() {
            let steps: Vec<&PlannedStep> = level.iter().collect();
            let keys: Vec<_> = steps
                .iter()
                .map(|step| RelationLoader::<S>::parent_keys(step, assembler.parent_rows(step)))
                .collect();

            let fetched = if self.config.concurrent_siblings {
                try_join_all(
                    steps
                        .iter()
                        .zip(keys)
                        .map(|(step, keys)| loader.load(step, keys)),
                )
                .await?
            } else {
                let mut fetched = Vec::with_capacity(steps.len());
                for (step, keys) in steps.iter().zip(keys) {
                    fetched.push(loader.load(step, keys).await?);
                }
                fetched
            };

            for (step, rows) in steps.into_iter().zip(fetched) {
                assembler.attach(step, rows)?;
            }
        }

        Ok(assembler.finish())
    }
}

/// A fluent find operation.
///
/// ```rust,ignore
/// let tasks = resolver
///     .query("Task")
///     .r#where(Filter::equals("done", false))
///     .include(IncludeSpec::model("User").include(IncludeSpec::model("Group")))
///     .take(10)
///     .exec()
///     .await?;
/// ```
pub struct FindOperation<'r, S> {
    resolver: &'r Resolver<S>,
    root: String,
    options: FindOptions,
}

impl<'r, S: Storage> FindOperation<'r, S> {
    /// Add a filter condition.
    pub fn r#where(mut self, filter: impl Into<Filter>) -> Self {
        self.options = self.options.r#where(filter);
        self
    }

    /// Include an association.
    pub fn include(mut self, spec: IncludeSpec) -> Self {
        self.options = self.options.include(spec);
        self
    }

    /// Take a limited number of root rows.
    pub fn take(mut self, n: u64) -> Self {
        self.options = self.options.take(n);
        self
    }

    /// Execute and return every root instance.
    pub async fn exec(self) -> QueryResult<Vec<Instance>> {
        self.resolver.find(&self.root, self.options).await
    }

    /// Execute and return the first root instance.
    pub async fn exec_one(self) -> QueryResult<Option<Instance>> {
        self.resolver.find_one(&self.root, self.options).await
    }

    /// Execute and return the first root instance, or a not-found error.
    pub async fn exec_one_or_fail(self) -> QueryResult<Instance> {
        self.resolver.find_one_or_fail(&self.root, self.options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResolverConfig, SingleMatchPolicy};
    use crate::row;
    use crate::schema::EntityType;
    use crate::storage::MemoryStore;
    use crate::value::Value;

    fn include(model: &str) -> IncludeSpec {
        IncludeSpec::model(model)
    }

    fn resolver() -> Resolver<MemoryStore> {
        let mut registry = Registry::new();
        for name in ["User", "Task", "Group"] {
            registry.register(EntityType::new(name)).unwrap();
        }
        registry.belongs_to("Task", "User").unwrap();
        registry.belongs_to("User", "Group").unwrap();
        registry.has_many("User", "Task").unwrap();

        let store = MemoryStore::new();
        store.seed("Groups", vec![row! { "id" => 1, "name" => "core" }]);
        store.seed(
            "Users",
            vec![
                row! { "id" => 1, "GroupId" => 1 },
                row! { "id" => 2, "GroupId" => Value::Null },
            ],
        );
        store.seed(
            "Tasks",
            vec![
                row! { "id" => 1, "UserId" => 1, "done" => false },
                row! { "id" => 2, "UserId" => 2, "done" => true },
                row! { "id" => 3, "UserId" => Value::Null, "done" => false },
            ],
        );
        Resolver::new(Arc::new(registry), store)
    }

    #[tokio::test]
    async fn test_find_without_includes() {
        let resolver = resolver();
        let tasks = resolver.find("Task", FindOptions::new()).await.unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks[0].slots().is_empty());
        assert_eq!(resolver.storage().round_trips(), 1);
    }

    #[tokio::test]
    async fn test_find_nested() {
        let resolver = resolver();
        let tasks = resolver
            .query("Task")
            .include(include("User").include(include("Group")))
            .exec()
            .await
            .unwrap();

        let group = tasks[0].one("user").and_then(|u| u.one("group")).unwrap();
        assert_eq!(group.get("name").as_str(), Some("core"));
        assert!(tasks[1].one("user").unwrap().one("group").is_none());
        assert!(tasks[2].one("user").is_none());
        assert_eq!(resolver.storage().round_trips(), 3);
    }

    #[tokio::test]
    async fn test_root_filter_and_take() {
        let resolver = resolver();
        let tasks = resolver
            .find("Task", FindOptions::new().r#where(Filter::equals("done", false)).take(1))
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id(), &Value::Int(1));

        let task = resolver
            .find_one("Task", FindOptions::new().r#where(Filter::equals("done", true)))
            .await
            .unwrap();
        assert_eq!(task.map(|t| t.id().clone()), Some(Value::Int(2)));
    }

    #[tokio::test]
    async fn test_find_one_or_fail() {
        let resolver = resolver();
        let task = resolver
            .query("Task")
            .r#where(Filter::equals("id", 2))
            .exec_one_or_fail()
            .await
            .unwrap();
        assert_eq!(task.id(), &Value::Int(2));

        let err = resolver
            .find_one_or_fail("Task", FindOptions::new().r#where(Filter::equals("id", 9)))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.context.model.as_deref(), Some("Task"));
    }

    #[tokio::test]
    async fn test_find_one_limits_before_required() {
        let resolver = resolver();
        resolver
            .storage()
            .seed("Tasks", vec![row! { "id" => 4, "UserId" => 1, "done" => false }]);
        let options = FindOptions::new()
            .r#where(Filter::Gt("id".into(), Value::Int(2)))
            .include(include("User").required(true));

        let all = resolver.find("Task", options.clone()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id(), &Value::Int(4));

        // Task 3 is the only row fetched and has no user.
        let one = resolver.find_one("Task", options).await.unwrap();
        assert!(one.is_none());
    }

    #[tokio::test]
    async fn test_include_filter() {
        let resolver = resolver();
        let users = resolver
            .find(
                "User",
                FindOptions::new().include(include("Task").r#where(Filter::equals("done", true))),
            )
            .await
            .unwrap();
        assert!(users[0].many("tasks").is_empty());
        assert_eq!(users[1].many("tasks").len(), 1);
    }

    #[tokio::test]
    async fn test_required_include_drops_roots() {
        let resolver = resolver();
        let tasks = resolver
            .find(
                "Task",
                FindOptions::new().include(include("User").required(true)),
            )
            .await
            .unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.id().clone()).collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2)]);
    }

    #[tokio::test]
    async fn test_unknown_include_performs_no_io() {
        let resolver = resolver();
        let err = resolver
            .find("Task", FindOptions::new().include(include("Group")))
            .await
            .unwrap_err();
        assert!(err.is_unknown_association());
        assert_eq!(resolver.storage().round_trips(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_aborts() {
        let resolver = resolver();
        resolver.storage().fail_table("Groups");
        let err = resolver
            .find("Task", FindOptions::new().include(include("User").include(include("Group"))))
            .await
            .unwrap_err();
        assert!(err.is_storage_error());
    }

    #[tokio::test]
    async fn test_sequential_siblings_match_concurrent() {
        let concurrent = resolver();
        let sequential =
            resolver().with_config(ResolverConfig::default().concurrent_siblings(false));
        let options = FindOptions::new()
            .include(include("Group"))
            .include(include("Task"));

        let a = concurrent.find("User", options.clone()).await.unwrap();
        let b = sequential.find("User", options).await.unwrap();
        pretty_assertions::assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_strict_single_match() {
        let resolver = resolver().with_config(
            ResolverConfig::default().single_match(SingleMatchPolicy::Error),
        );
        resolver.storage().seed("Users", vec![row! { "id" => 1 }]);
        let err = resolver
            .find("Task", FindOptions::new().include(include("User")))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::AmbiguousMatch);
    }
}
