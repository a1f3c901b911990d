//! # Weft
//!
//! Eager-loading association resolution for relational data.
//!
//! Weft takes a root query plus a nested include tree and returns one owned
//! object graph:
//! - Associations declared explicitly on a [`Registry`]
//! - Include trees validated before any I/O
//! - One batched query per include step, two for many-to-many
//! - Single-valued slots are `Option`, multi-valued slots are ordered lists
//! - Pluggable storage: in-memory, or SQLite with the `sqlite` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use weft_orm::prelude::*;
//!
//! # futures::executor::block_on(async {
//! let mut registry = Registry::new();
//! registry.register(EntityType::new("User"))?;
//! registry.register(EntityType::new("Task").attribute("title", AttributeType::Text))?;
//! registry.has_many("User", "Task")?;
//!
//! let resolver = Resolver::new(Arc::new(registry), MemoryStore::new());
//! let user = resolver.create("User", row! {}).await?;
//! let tasks = resolver
//!     .bulk_create("Task", vec![row! { "title" => "a" }, row! { "title" => "b" }])
//!     .await?;
//! let tasks: Vec<&Instance> = tasks.iter().collect();
//! resolver.set_association(&user, "tasks", &tasks).await?;
//!
//! let users = resolver.query("User").include(IncludeSpec::model("Task")).exec().await?;
//! assert_eq!(users[0].many("tasks").len(), 2);
//! # Ok::<(), QueryError>(())
//! # }).unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The resolution engine: registry, planning, fetching and assembly.
pub mod query {
    pub use weft_query::*;
}

/// SQLite storage backend.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use weft_sqlite::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use weft_query::prelude::*;

    #[cfg(feature = "sqlite")]
    pub use weft_sqlite::{SqliteConfig, SqliteStore};
}

// Re-export key types at the crate root
pub use weft_query::{
    Filter, IncludeSpec, Instance, QueryError, QueryResult, Registry, Resolver, ResolverConfig,
    row,
};
