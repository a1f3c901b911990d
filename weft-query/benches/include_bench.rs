//! Benchmarks for include planning and eager-loading resolution.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use weft_query::prelude::*;
use weft_query::IncludePlan;

fn registry() -> Registry {
    let mut registry = Registry::new();
    for name in ["User", "Group", "Task", "Product", "Tag"] {
        registry.register(EntityType::new(name)).unwrap();
    }
    registry.belongs_to("Task", "User").unwrap();
    registry.has_many("User", "Task").unwrap();
    registry.belongs_to("User", "Group").unwrap();
    registry.has_many("Group", "User").unwrap();
    registry.belongs_to_many("Product", "Tag").unwrap();
    registry
}

/// Seed `n` users spread over 10 groups, each owning 5 tasks.
fn seeded_store(n: i64) -> MemoryStore {
    let store = MemoryStore::new();
    store.seed(
        "Groups",
        (1..=10).map(|id| row! { "id" => id, "name" => format!("group {id}") }).collect(),
    );
    store.seed(
        "Users",
        (1..=n)
            .map(|id| row! { "id" => id, "GroupId" => id % 10 + 1 })
            .collect(),
    );
    store.seed(
        "Tasks",
        (1..=n * 5)
            .map(|id| row! { "id" => id, "UserId" => (id - 1) / 5 + 1, "done" => id % 2 == 0 })
            .collect(),
    );
    store
}

fn bench_plan(c: &mut Criterion) {
    let registry = registry();
    let config = ResolverConfig::default();
    let includes = vec![
        IncludeSpec::model("User")
            .include(IncludeSpec::model("Group").include(IncludeSpec::model("User"))),
    ];

    c.bench_function("plan_nested_includes", |b| {
        b.iter(|| IncludePlan::build(black_box(&registry), "Task", black_box(&includes), &config))
    });
}

fn bench_find(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let registry = Arc::new(registry());

    let mut group = c.benchmark_group("find_with_includes");
    for n in [10_i64, 100, 1000] {
        let resolver = Resolver::new(registry.clone(), seeded_store(n));
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("has_many_then_belongs_to", n), &n, |b, _| {
            b.to_async(&rt).iter(|| async {
                let users = resolver
                    .query("User")
                    .include(IncludeSpec::model("Task"))
                    .include(IncludeSpec::model("Group"))
                    .exec()
                    .await
                    .unwrap();
                black_box(users)
            })
        });

        group.bench_with_input(BenchmarkId::new("three_levels", n), &n, |b, _| {
            b.to_async(&rt).iter(|| async {
                let tasks = resolver
                    .query("Task")
                    .include(IncludeSpec::model("User").include(IncludeSpec::model("Group")))
                    .exec()
                    .await
                    .unwrap();
                black_box(tasks)
            })
        });
    }
    group.finish();
}

fn bench_many_to_many(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = MemoryStore::new();
    store.seed("Products", (1..=500).map(|id| row! { "id" => id }).collect());
    store.seed("Tags", (1..=20).map(|id| row! { "id" => id }).collect());
    store.seed(
        "ProductsTags",
        (1..=500_i64)
            .flat_map(|p| {
                (0..3).map(move |k| row! { "ProductId" => p, "TagId" => (p + k) % 20 + 1 })
            })
            .collect(),
    );
    let resolver = Resolver::new(Arc::new(registry()), store);

    c.bench_function("belongs_to_many_500", |b| {
        b.to_async(&rt).iter(|| async {
            let products = resolver
                .query("Product")
                .include(IncludeSpec::model("Tag"))
                .exec()
                .await
                .unwrap();
            black_box(products)
        })
    });
}

criterion_group!(benches, bench_plan, bench_find, bench_many_to_many);
criterion_main!(benches);
