//! Eager-loading scenarios against a real SQLite database.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use weft_query::prelude::*;
use weft_sqlite::SqliteStore;

async fn resolver(registry: Registry) -> Resolver<SqliteStore> {
    let store = SqliteStore::memory().await.unwrap();
    store.sync(&registry, true).await.unwrap();
    Resolver::new(Arc::new(registry), store)
}

fn registry(entities: &[&str]) -> Registry {
    let mut registry = Registry::new();
    for name in entities {
        registry.register(EntityType::new(*name)).unwrap();
    }
    registry
}

fn by_id(instance: &Instance) -> Filter {
    Filter::equals("id", instance.id().clone())
}

#[tokio::test]
async fn test_nested_belongs_to_belongs_to() {
    let mut registry = registry(&["Task", "User", "Group"]);
    registry.belongs_to("Task", "User").unwrap();
    registry.belongs_to("User", "Group").unwrap();
    let resolver = resolver(registry).await;

    let task = resolver.create("Task", row! {}).await.unwrap();
    let user = resolver.create("User", row! {}).await.unwrap();
    let group = resolver.create("Group", row! {}).await.unwrap();
    let (users, groups) = ([&user], [&group]);
    let mut batch = WriteBatch::new();
    batch.push(resolver.set_association(&task, "user", &users));
    batch.push(resolver.set_association(&user, "group", &groups));
    batch.run().await.unwrap();

    let found = resolver
        .query("Task")
        .r#where(by_id(&task))
        .include(IncludeSpec::model("User").include(IncludeSpec::model("Group")))
        .exec_one()
        .await
        .unwrap()
        .unwrap();

    let found_user = found.one("user").unwrap();
    assert_eq!(found_user.id(), user.id());
    assert_eq!(found_user.one("group").unwrap().id(), group.id());
}

#[tokio::test]
async fn test_nested_has_one_has_one() {
    let mut registry = registry(&["Task", "User", "Group"]);
    registry.has_one("User", "Task").unwrap();
    registry.has_one("Group", "User").unwrap();
    let resolver = resolver(registry).await;

    let task = resolver.create("Task", row! {}).await.unwrap();
    let user = resolver.create("User", row! {}).await.unwrap();
    let group = resolver.create("Group", row! {}).await.unwrap();
    resolver.set_association(&user, "task", &[&task]).await.unwrap();
    resolver.set_association(&group, "user", &[&user]).await.unwrap();

    let found = resolver
        .find_one(
            "Group",
            FindOptions::new()
                .r#where(by_id(&group))
                .include(IncludeSpec::model("User").include(IncludeSpec::model("Task"))),
        )
        .await
        .unwrap()
        .unwrap();

    let found_user = found.one("user").unwrap();
    assert_eq!(found_user.get("GroupId"), group.id());
    assert_eq!(found_user.one("task").unwrap().get("UserId"), user.id());
}

#[tokio::test]
async fn test_nested_has_many_belongs_to() {
    let mut registry = registry(&["Task", "User", "Project"]);
    registry.has_many("User", "Task").unwrap();
    registry.belongs_to("Task", "Project").unwrap();
    let resolver = resolver(registry).await;

    let user = resolver.create("User", row! {}).await.unwrap();
    let projects = resolver.bulk_create("Project", vec![row! {}, row! {}]).await.unwrap();
    let tasks = resolver
        .bulk_create(
            "Task",
            [0, 1, 0, 1]
                .iter()
                .map(|&i| row! { "ProjectId" => projects[i].id().clone() })
                .collect(),
        )
        .await
        .unwrap();
    let task_refs: Vec<&Instance> = tasks.iter().collect();
    resolver.set_association(&user, "tasks", &task_refs).await.unwrap();

    let found = resolver
        .query("User")
        .r#where(by_id(&user))
        .include(IncludeSpec::model("Task").include(IncludeSpec::model("Project")))
        .exec_one()
        .await
        .unwrap()
        .unwrap();

    let found_tasks = found.many("tasks");
    assert_eq!(found_tasks.len(), 4);
    let project_ids: Vec<_> = found_tasks
        .iter()
        .map(|t| t.one("project").unwrap().id().clone())
        .collect();
    assert_eq!(
        project_ids,
        vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::Int(2)]
    );
}

#[tokio::test]
async fn test_nested_belongs_to_has_many() {
    let mut registry = registry(&["Task", "Worker", "Project"]);
    registry.belongs_to("Worker", "Project").unwrap();
    registry.has_many("Project", "Task").unwrap();
    let resolver = resolver(registry).await;

    let worker = resolver.create("Worker", row! {}).await.unwrap();
    let project = resolver.create("Project", row! {}).await.unwrap();
    let tasks = resolver
        .bulk_create("Task", vec![row! {}, row! {}, row! {}, row! {}])
        .await
        .unwrap();
    let task_refs: Vec<&Instance> = tasks.iter().collect();
    resolver.set_association(&project, "tasks", &task_refs).await.unwrap();
    resolver.set_association(&worker, "project", &[&project]).await.unwrap();

    let found = resolver
        .query("Worker")
        .r#where(by_id(&worker))
        .include(IncludeSpec::model("Project").include(IncludeSpec::model("Task")))
        .exec_one()
        .await
        .unwrap()
        .unwrap();

    let found_project = found.one("project").unwrap();
    assert_eq!(found_project.many("tasks").len(), 4);
}

#[tokio::test]
async fn test_nested_many_to_many() {
    let mut registry = Registry::new();
    registry.register(EntityType::new("User")).unwrap();
    registry
        .register(EntityType::new("Product").attribute("title", AttributeType::Text))
        .unwrap();
    registry
        .register(EntityType::new("Tag").attribute("name", AttributeType::Text))
        .unwrap();
    registry.has_many("User", "Product").unwrap();
    registry.belongs_to_many("Product", "Tag").unwrap();
    registry.belongs_to_many("Tag", "Product").unwrap();
    let resolver = resolver(registry).await;

    let user = resolver.create("User", row! {}).await.unwrap();
    let products = resolver
        .bulk_create(
            "Product",
            ["Chair", "Desk", "Dress", "Bed"]
                .into_iter()
                .map(|title| row! { "title" => title })
                .collect(),
        )
        .await
        .unwrap();
    let tags = resolver
        .bulk_create("Tag", ["A", "B", "C"].into_iter().map(|n| row! { "name" => n }).collect())
        .await
        .unwrap();

    let product_refs: Vec<&Instance> = products.iter().collect();
    resolver.set_association(&user, "products", &product_refs).await.unwrap();

    let (first, second, third) = ([&tags[0], &tags[2]], [&tags[1]], [&tags[0], &tags[1], &tags[2]]);
    let mut batch = WriteBatch::new();
    batch.push(resolver.set_association(&products[0], "tags", &first));
    batch.push(resolver.set_association(&products[1], "tags", &second));
    batch.push(resolver.set_association(&products[2], "tags", &third));
    batch.run().await.unwrap();

    resolver.storage().reset_counters();
    let found = resolver
        .query("User")
        .r#where(by_id(&user))
        .include(IncludeSpec::model("Product").include(IncludeSpec::model("Tag")))
        .exec_one()
        .await
        .unwrap()
        .unwrap();

    let counts: Vec<_> = found.many("products").iter().map(|p| p.many("tags").len()).collect();
    assert_eq!(counts, vec![2, 1, 3, 0]);

    let names: Vec<_> = found.many("products")[0]
        .many("tags")
        .iter()
        .map(|t| t.get("name").as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["A", "C"]);

    // root + products + join rows + tags
    assert_eq!(resolver.storage().round_trips(), 4);
}

#[tokio::test]
async fn test_round_trips_independent_of_parent_count() {
    let mut registry = Registry::new();
    registry.register(EntityType::new("User")).unwrap();
    registry
        .register(EntityType::new("Task").attribute("done", AttributeType::Boolean))
        .unwrap();
    registry.has_many("User", "Task").unwrap();
    registry.belongs_to("Task", "User").unwrap();
    let resolver = resolver(registry).await;

    let mut created = 0;
    for n in [1_usize, 10, 100] {
        while created < n {
            let user = resolver.create("User", row! {}).await.unwrap();
            resolver
                .create("Task", row! { "UserId" => user.id().clone(), "done" => created % 2 == 0 })
                .await
                .unwrap();
            created += 1;
        }

        resolver.storage().reset_counters();
        let users = resolver
            .query("User")
            .include(IncludeSpec::model("Task").include(IncludeSpec::model("User")))
            .exec()
            .await
            .unwrap();
        assert_eq!(users.len(), n);
        assert!(users.iter().all(|u| u.many("tasks").len() == 1));
        assert_eq!(resolver.storage().round_trips(), 3, "n = {n}");
    }
}

#[tokio::test]
async fn test_filtered_required_include() {
    let mut registry = Registry::new();
    registry.register(EntityType::new("User")).unwrap();
    registry
        .register(EntityType::new("Task").attribute("done", AttributeType::Boolean))
        .unwrap();
    registry.has_many("User", "Task").unwrap();
    let resolver = resolver(registry).await;

    let users = resolver.bulk_create("User", vec![row! {}, row! {}]).await.unwrap();
    resolver
        .create("Task", row! { "UserId" => users[0].id().clone(), "done" => true })
        .await
        .unwrap();
    resolver
        .create("Task", row! { "UserId" => users[1].id().clone(), "done" => false })
        .await
        .unwrap();

    let found = resolver
        .query("User")
        .include(
            IncludeSpec::model("Task")
                .r#where(Filter::equals("done", true))
                .required(true),
        )
        .exec()
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), users[0].id());
    assert_eq!(found[0].many("tasks")[0].get("done"), &Value::Bool(true));
}

#[tokio::test]
async fn test_unknown_association_issues_no_statement() {
    let mut registry = registry(&["Task", "User", "Group"]);
    registry.belongs_to("Task", "User").unwrap();
    let resolver = resolver(registry).await;

    let err = resolver
        .query("Task")
        .include(IncludeSpec::model("Group"))
        .exec()
        .await
        .unwrap_err();
    assert!(err.is_unknown_association());
    assert_eq!(resolver.storage().round_trips(), 0);
}

#[tokio::test]
async fn test_missing_table_aborts_resolution() {
    let mut registry = registry(&["Task", "User"]);
    registry.belongs_to("Task", "User").unwrap();
    let store = SqliteStore::memory().await.unwrap();
    store
        .execute_batch("CREATE TABLE \"Tasks\" (\"id\" INTEGER PRIMARY KEY, \"UserId\" INTEGER)")
        .await
        .unwrap();
    store
        .execute_batch("INSERT INTO \"Tasks\" (\"UserId\") VALUES (1)")
        .await
        .unwrap();
    let resolver = Resolver::new(Arc::new(registry), store);

    let err = resolver
        .query("Task")
        .include(IncludeSpec::model("User"))
        .exec()
        .await
        .unwrap_err();
    assert!(err.is_storage_error());
}

#[tokio::test]
async fn test_parent_set_beyond_variable_limit() {
    let mut registry = registry(&["User", "Task"]);
    registry.has_many("User", "Task").unwrap();
    let resolver = resolver(registry).await;

    // More distinct keys than SQLite allows bound variables.
    let users = 40_000;
    resolver
        .storage()
        .execute_batch(&format!(
            "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {users}) \
             INSERT INTO \"Users\" (\"id\") SELECT i FROM n; \
             INSERT INTO \"Tasks\" (\"UserId\") SELECT \"id\" FROM \"Users\";"
        ))
        .await
        .unwrap();

    resolver.storage().reset_counters();
    let found = resolver
        .query("User")
        .include(IncludeSpec::model("Task"))
        .exec()
        .await
        .unwrap();

    assert_eq!(found.len(), users);
    assert!(found.iter().all(|u| u.many("tasks").len() == 1));
    assert_eq!(
        found[users - 1].many("tasks")[0].get("UserId"),
        &Value::Int(users as i64)
    );
    assert_eq!(resolver.storage().round_trips(), 2);
}
