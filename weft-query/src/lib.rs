//! # weft-query
//!
//! Eager-loading association resolution for the Weft ORM.
//!
//! This crate turns a root query plus a nested include tree into one owned
//! object graph:
//! - Association registry (`belongs_to`, `has_one`, `has_many`, `belongs_to_many`)
//! - Include plans validated before any I/O
//! - Batched fetching: one query per include step, two for many-to-many
//! - Graph assembly with correct cardinalities and storage order
//! - A storage boundary with an in-memory implementation
//!
//! ## Declaring associations
//!
//! ```rust
//! use weft_query::{AttributeType, EntityType, Registry};
//!
//! let mut registry = Registry::new();
//! registry.register(EntityType::new("User").attribute("name", AttributeType::Text))?;
//! registry.register(EntityType::new("Task").attribute("title", AttributeType::Text))?;
//!
//! let user = registry.belongs_to("Task", "User")?;
//! assert_eq!(user.foreign_key, "UserId");
//!
//! let tasks = registry.has_many("User", "Task")?;
//! assert_eq!(tasks.name, "tasks");
//! # Ok::<(), weft_query::QueryError>(())
//! ```
//!
//! ## Filters
//!
//! ```rust
//! use weft_query::{row, Filter, Value};
//!
//! let filter = Filter::and([
//!     Filter::equals("done", false),
//!     Filter::is_in("UserId", vec![Value::Int(1), Value::Int(2)]),
//! ]);
//! assert!(filter.matches(&row! { "done" => false, "UserId" => 2 }));
//! ```
//!
//! ## Resolving includes
//!
//! ```rust
//! use std::sync::Arc;
//! use weft_query::prelude::*;
//! # futures::executor::block_on(async {
//!
//! let mut registry = Registry::new();
//! for name in ["User", "Group", "Task"] {
//!     registry.register(EntityType::new(name))?;
//! }
//! registry.belongs_to("Task", "User")?;
//! registry.belongs_to("User", "Group")?;
//!
//! let store = MemoryStore::new();
//! store.seed("Groups", vec![row! { "id" => 1, "name" => "core" }]);
//! store.seed("Users", vec![row! { "id" => 1, "GroupId" => 1 }]);
//! store.seed("Tasks", vec![row! { "id" => 1, "UserId" => 1 }, row! { "id" => 2 }]);
//!
//! let resolver = Resolver::new(Arc::new(registry), store);
//! let tasks = resolver
//!     .query("Task")
//!     .include(IncludeSpec::model("User").include(IncludeSpec::model("Group")))
//!     .exec()
//!     .await?;
//!
//! let group = tasks[0].one("user").and_then(|u| u.one("group")).unwrap();
//! assert_eq!(group.get("name").as_str(), Some("core"));
//! assert!(tasks[1].one("user").is_none());
//!
//! // root + users + groups
//! assert_eq!(resolver.storage().round_trips(), 3);
//! # Ok::<(), QueryError>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod instance;
pub mod logging;
pub mod naming;
pub mod operations;
pub mod relations;
pub mod schema;
pub mod storage;
pub mod value;

pub use config::{ResolverConfig, SingleMatchPolicy};
pub use error::{ErrorCode, QueryError, QueryResult};
pub use filter::Filter;
pub use instance::{Instance, Slot};
pub use operations::{FindOperation, FindOptions, Resolver, WriteBatch};
pub use relations::{
    Association, AssociationKind, AssociationOptions, IncludePlan, IncludeSpec, IncludeTarget,
    JoinRecord, Registry,
};
pub use schema::{AttributeType, EntityType};
pub use storage::{
    BoxFuture, InsertDescriptor, MemoryStore, QueryDescriptor, Storage, StorageWrite,
};
pub use value::{Key, Row, Value};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ResolverConfig, SingleMatchPolicy};
    pub use crate::error::{ErrorCode, QueryError, QueryResult};
    pub use crate::filter::Filter;
    pub use crate::instance::{Instance, Slot};
    pub use crate::operations::*;
    pub use crate::relations::{AssociationKind, AssociationOptions, IncludeSpec, Registry};
    pub use crate::row;
    pub use crate::schema::{AttributeType, EntityType};
    pub use crate::storage::{MemoryStore, Storage, StorageWrite};
    pub use crate::value::{Row, Value};
}
