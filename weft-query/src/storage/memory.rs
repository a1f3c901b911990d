//! In-process storage backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::error::{QueryError, QueryResult};
use crate::value::{Row, Value};

use super::{BoxFuture, InsertDescriptor, QueryDescriptor, Storage, StorageWrite};

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

/// A thread-safe in-memory table store.
///
/// Rows are returned in insertion order. Every call made through
/// [`Storage`] or [`StorageWrite`] counts as one round-trip; reads are also
/// recorded in a query log.
///
/// ```rust
/// use weft_query::storage::{MemoryStore, QueryDescriptor, Storage};
/// use weft_query::row;
///
/// # futures::executor::block_on(async {
/// let store = MemoryStore::new();
/// store.seed("Users", vec![row! { "id" => 1, "name" => "Ann" }]);
///
/// let rows = store.execute(QueryDescriptor::new("User", "Users")).await?;
/// assert_eq!(rows.len(), 1);
/// assert_eq!(store.round_trips(), 1);
/// # Ok::<(), weft_query::QueryError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    failing: RwLock<HashSet<String>>,
    log: Mutex<Vec<QueryDescriptor>>,
    round_trips: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows to a table without counting a round-trip.
    pub fn seed(&self, table: &str, rows: Vec<Row>) {
        let mut tables = self.tables.write();
        let table = tables.entry(table.to_string()).or_default();
        for row in rows {
            if let Some(id) = row.get("id").and_then(Value::as_i64) {
                table.next_id = table.next_id.max(id);
            }
            table.rows.push(row);
        }
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Number of round-trips performed since creation or the last reset.
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// Reads performed since creation or the last reset, in order.
    pub fn queries(&self) -> Vec<QueryDescriptor> {
        self.log.lock().clone()
    }

    /// Reset the round-trip counter and the query log.
    pub fn reset_counters(&self) {
        self.round_trips.store(0, Ordering::SeqCst);
        self.log.lock().clear();
    }

    /// Make every subsequent operation on `table` fail.
    pub fn fail_table(&self, table: &str) {
        self.failing.write().insert(table.to_string());
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        self.failing.write().clear();
    }

    /// Drop every table.
    pub fn clear(&self) {
        self.tables.write().clear();
    }

    fn begin(&self, table: &str) -> QueryResult<()> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        if self.failing.read().contains(table) {
            return Err(QueryError::database(format!(
                "injected failure on table {}",
                table
            ))
            .with_context("memory store"));
        }
        Ok(())
    }

    fn select(&self, query: &QueryDescriptor) -> QueryResult<Vec<Row>> {
        self.log.lock().push(query.clone());
        self.begin(&query.table)?;

        let tables = self.tables.read();
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let rows: Vec<Row> = tables
            .get(&query.table)
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|row| query.filter.matches(row))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        trace!(table = %query.table, rows = rows.len(), "memory select");
        Ok(rows)
    }

    fn insert_row(&self, insert: InsertDescriptor) -> QueryResult<Row> {
        self.begin(&insert.table)?;

        let mut tables = self.tables.write();
        let table = tables.entry(insert.table.clone()).or_default();
        let mut row = insert.values;

        if let Some(pk) = &insert.primary_key {
            match row.get(pk).and_then(Value::key) {
                Some(key) => {
                    let taken = table
                        .rows
                        .iter()
                        .any(|r| r.get(pk).and_then(Value::key).as_ref() == Some(&key));
                    if taken {
                        return Err(QueryError::unique_violation(
                            insert.entity.as_str(),
                            pk.as_str(),
                        ));
                    }
                    if let Some(id) = row.get(pk).and_then(Value::as_i64) {
                        table.next_id = table.next_id.max(id);
                    }
                }
                None => {
                    table.next_id += 1;
                    row.shift_insert(0, pk.clone(), Value::Int(table.next_id));
                }
            }
        }

        table.rows.push(row.clone());
        Ok(row)
    }

    fn update_rows(&self, query: &QueryDescriptor, values: &Row) -> QueryResult<u64> {
        self.begin(&query.table)?;

        let mut tables = self.tables.write();
        let mut affected = 0;
        if let Some(table) = tables.get_mut(&query.table) {
            for row in table.rows.iter_mut().filter(|row| query.filter.matches(row)) {
                for (name, value) in values {
                    row.insert(name.clone(), value.clone());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    fn delete_rows(&self, query: &QueryDescriptor) -> QueryResult<u64> {
        self.begin(&query.table)?;

        let mut tables = self.tables.write();
        let Some(table) = tables.get_mut(&query.table) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table.rows.retain(|row| !query.filter.matches(row));
        Ok((before - table.rows.len()) as u64)
    }
}

impl Storage for MemoryStore {
    fn execute(&self, query: QueryDescriptor) -> BoxFuture<'_, QueryResult<Vec<Row>>> {
        Box::pin(async move { self.select(&query) })
    }
}

impl StorageWrite for MemoryStore {
    fn insert(&self, insert: InsertDescriptor) -> BoxFuture<'_, QueryResult<Row>> {
        Box::pin(async move { self.insert_row(insert) })
    }

    fn update(&self, query: QueryDescriptor, values: Row) -> BoxFuture<'_, QueryResult<u64>> {
        Box::pin(async move { self.update_rows(&query, &values) })
    }

    fn delete(&self, query: QueryDescriptor) -> BoxFuture<'_, QueryResult<u64>> {
        Box::pin(async move { self.delete_rows(&query) })
    }
}
