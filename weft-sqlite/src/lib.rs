//! SQLite storage backend for Weft.
//!
//! [`SqliteStore`] implements the `weft-query` storage traits on top of
//! `tokio-rusqlite`, so the eager-loading resolver runs unchanged against a
//! real database. Reads are rendered as parameterised `SELECT`s in rowid
//! order; tables can be derived from a [`Registry`](weft_query::Registry)
//! with [`SqliteStore::sync`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weft_query::prelude::*;
//! use weft_sqlite::{SqliteConfig, SqliteStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = Registry::new();
//! registry.register(EntityType::new("User").attribute("name", AttributeType::Text))?;
//! registry.register(EntityType::new("Task").attribute("title", AttributeType::Text))?;
//! registry.belongs_to("Task", "User")?;
//!
//! let store = SqliteStore::open(SqliteConfig::from_url("sqlite://./app.db")?).await?;
//! store.sync(&registry, false).await?;
//!
//! let resolver = Resolver::new(Arc::new(registry), store);
//! let tasks = resolver
//!     .query("Task")
//!     .include(IncludeSpec::model("User"))
//!     .exec()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod sql;
pub mod types;

pub use config::{DatabasePath, SqliteConfig};
pub use engine::SqliteStore;
pub use error::{SqliteError, SqliteResult};
