//! The storage boundary.
//!
//! Resolution performs I/O only through [`Storage::execute`]: one call is
//! one round-trip. Writes used to seed and link data go through
//! [`StorageWrite`].

mod memory;

pub use memory::MemoryStore;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::QueryResult;
use crate::filter::Filter;
use crate::value::Row;

/// A boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A structured read request against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    /// Entity type name.
    pub entity: String,
    /// Table name.
    pub table: String,
    /// Row filter.
    pub filter: Filter,
    /// Maximum number of rows.
    pub limit: Option<u64>,
}

impl QueryDescriptor {
    /// Select every row of a table.
    pub fn new(entity: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            table: table.into(),
            filter: Filter::None,
            limit: None,
        }
    }

    /// AND a filter into the request.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = std::mem::take(&mut self.filter).and_then(filter);
        self
    }

    /// Limit the number of rows.
    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }
}

/// A single-row insert request.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertDescriptor {
    /// Entity type name.
    pub entity: String,
    /// Table name.
    pub table: String,
    /// Primary key column to generate when absent; `None` for join records.
    pub primary_key: Option<String>,
    /// Column values.
    pub values: Row,
}

/// Read access to stored rows.
pub trait Storage: Send + Sync {
    /// Execute a read and return the matching rows in storage order.
    fn execute(&self, query: QueryDescriptor) -> BoxFuture<'_, QueryResult<Vec<Row>>>;
}

/// Write access used to seed and link data.
pub trait StorageWrite: Storage {
    /// Insert one row and return it as stored, with any generated key.
    fn insert(&self, insert: InsertDescriptor) -> BoxFuture<'_, QueryResult<Row>>;

    /// Assign `values` on every matching row; returns the affected count.
    fn update(&self, query: QueryDescriptor, values: Row) -> BoxFuture<'_, QueryResult<u64>>;

    /// Delete every matching row; returns the affected count.
    fn delete(&self, query: QueryDescriptor) -> BoxFuture<'_, QueryResult<u64>>;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn execute(&self, query: QueryDescriptor) -> BoxFuture<'_, QueryResult<Vec<Row>>> {
        (**self).execute(query)
    }
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn execute(&self, query: QueryDescriptor) -> BoxFuture<'_, QueryResult<Vec<Row>>> {
        (**self).execute(query)
    }
}

impl<S: StorageWrite + ?Sized> StorageWrite for &S {
    fn insert(&self, insert: InsertDescriptor) -> BoxFuture<'_, QueryResult<Row>> {
        (**self).insert(insert)
    }

    fn update(&self, query: QueryDescriptor, values: Row) -> BoxFuture<'_, QueryResult<u64>> {
        (**self).update(query, values)
    }

    fn delete(&self, query: QueryDescriptor) -> BoxFuture<'_, QueryResult<u64>> {
        (**self).delete(query)
    }
}

impl<S: StorageWrite + ?Sized> StorageWrite for Arc<S> {
    fn insert(&self, insert: InsertDescriptor) -> BoxFuture<'_, QueryResult<Row>> {
        (**self).insert(insert)
    }

    fn update(&self, query: QueryDescriptor, values: Row) -> BoxFuture<'_, QueryResult<u64>> {
        (**self).update(query, values)
    }

    fn delete(&self, query: QueryDescriptor) -> BoxFuture<'_, QueryResult<u64>> {
        (**self).delete(query)
    }
}
