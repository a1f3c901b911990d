//! SQLite storage backend.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;
use rusqlite::params_from_iter;
use rusqlite::types::{Value as SqlValue, ValueRef};
use tokio_rusqlite::Connection;
use tracing::{debug, instrument};

use weft_query::storage::{BoxFuture, InsertDescriptor, QueryDescriptor, Storage, StorageWrite};
use weft_query::{AttributeType, QueryError, QueryResult, Registry, Row, Value};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::sql::{self, Statement, TableDef};
use crate::types::from_sql;

type ColumnTypes = IndexMap<String, AttributeType>;

/// A [`Storage`] backend over one SQLite connection.
///
/// The connection runs on its own thread via `tokio-rusqlite`; the store is
/// cheap to clone and clones share the connection. Column types learned
/// from [`SqliteStore::sync`] or [`SqliteStore::describe`] drive decoding of
/// `Boolean` and `Json` attributes.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
    config: SqliteConfig,
    columns: Arc<RwLock<HashMap<String, ColumnTypes>>>,
    round_trips: Arc<AtomicUsize>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .field("round_trips", &self.round_trips())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open a store and apply the configured pragmas.
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path.clone()).await?,
        };
        let init = config.init_sql();
        conn.call(move |conn| Ok(conn.execute_batch(&init)?)).await?;
        debug!(path = ?config.path, "opened SQLite store");

        Ok(Self {
            conn,
            config,
            columns: Arc::new(RwLock::new(HashMap::new())),
            round_trips: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Open a private in-memory store.
    pub async fn memory() -> SqliteResult<Self> {
        Self::open(SqliteConfig::memory()).await
    }

    /// The configuration the store was opened with.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Number of statements issued through the storage traits.
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// Reset the round-trip counter.
    pub fn reset_counters(&self) {
        self.round_trips.store(0, Ordering::SeqCst);
    }

    /// Learn column types from the registry without touching the database.
    pub fn describe(&self, registry: &Registry) {
        self.remember(&sql::table_defs(registry));
    }

    fn remember(&self, tables: &[TableDef]) {
        let mut columns = self.columns.write();
        for table in tables {
            columns.insert(table.name.clone(), table.columns.clone());
        }
    }

    /// Create a table for every entity type and join record.
    ///
    /// With `force`, existing tables are dropped first.
    #[instrument(skip(self, registry))]
    pub async fn sync(&self, registry: &Registry, force: bool) -> SqliteResult<()> {
        let tables = sql::table_defs(registry);
        let mut batch = Vec::new();
        if force {
            batch.extend(tables.iter().rev().map(TableDef::drop_sql));
        }
        batch.extend(tables.iter().map(TableDef::create_sql));
        self.run_ddl(batch).await?;
        self.remember(&tables);
        debug!(tables = tables.len(), "synced schema");
        Ok(())
    }

    /// Drop every table derived from the registry.
    #[instrument(skip(self, registry))]
    pub async fn drop_all(&self, registry: &Registry) -> SqliteResult<()> {
        let tables = sql::table_defs(registry);
        self.run_ddl(tables.iter().rev().map(TableDef::drop_sql).collect())
            .await?;
        let mut columns = self.columns.write();
        for table in &tables {
            columns.remove(&table.name);
        }
        Ok(())
    }

    /// Run raw SQL, for fixtures and migrations outside the registry.
    pub async fn execute_batch(&self, sql: impl Into<String>) -> SqliteResult<()> {
        let sql = sql.into();
        debug!(sql = %sql, "executing batch");
        self.conn
            .call(move |conn| Ok(conn.execute_batch(&sql)?))
            .await?;
        Ok(())
    }

    // Foreign key checks are suspended so tables drop in any order.
    async fn run_ddl(&self, statements: Vec<String>) -> SqliteResult<()> {
        let mut sql = String::from("PRAGMA foreign_keys = OFF;\n");
        for statement in statements {
            sql.push_str(&statement);
            sql.push_str(";\n");
        }
        if self.config.foreign_keys {
            sql.push_str("PRAGMA foreign_keys = ON;\n");
        }
        self.execute_batch(sql).await
    }

    async fn query_rows(&self, statement: Statement, table: &str) -> SqliteResult<Vec<Row>> {
        let types = self.columns.read().get(table).cloned();
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        debug!(sql = %statement.sql, params = statement.params.len(), "executing query");

        let (names, raw) = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&statement.sql)?;
                let names: Vec<String> =
                    stmt.column_names().iter().map(|s| s.to_string()).collect();
                let width = names.len();
                let rows = stmt.query_map(params_from_iter(statement.params.iter()), |row| {
                    (0..width)
                        .map(|i| row.get::<_, SqlValue>(i))
                        .collect::<Result<Vec<_>, _>>()
                })?;
                let raw = rows.collect::<Result<Vec<_>, _>>()?;
                Ok((names, raw))
            })
            .await?;

        raw.into_iter()
            .map(|values| {
                names
                    .iter()
                    .zip(values)
                    .map(|(name, value)| {
                        let declared = types.as_ref().and_then(|t| t.get(name).copied());
                        let value = from_sql(ValueRef::from(&value), declared)?;
                        Ok::<_, SqliteError>((name.clone(), value))
                    })
                    .collect()
            })
            .collect()
    }

    /// Returns the affected row count and the last inserted rowid.
    async fn run_statement(&self, statement: Statement) -> SqliteResult<(u64, i64)> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        debug!(sql = %statement.sql, params = statement.params.len(), "executing statement");
        let result = self
            .conn
            .call(move |conn| {
                let params = params_from_iter(statement.params.iter());
                let affected = conn.execute(&statement.sql, params)?;
                Ok((affected as u64, conn.last_insert_rowid()))
            })
            .await?;
        Ok(result)
    }

    async fn insert_row(&self, insert: InsertDescriptor) -> SqliteResult<Row> {
        let (_, rowid) = self
            .run_statement(sql::insert(&insert.table, &insert.values))
            .await?;

        let mut row = insert.values;
        if let Some(pk) = insert.primary_key {
            let id = match row.shift_remove(&pk) {
                Some(value) if !value.is_null() => value,
                _ => Value::Int(rowid),
            };
            row.shift_insert(0, pk, id);
        }
        Ok(row)
    }
}

impl Storage for SqliteStore {
    fn execute(&self, query: QueryDescriptor) -> BoxFuture<'_, QueryResult<Vec<Row>>> {
        Box::pin(async move {
            self.query_rows(sql::select(&query), &query.table)
                .await
                .map_err(|e| QueryError::from(e).with_model(&query.entity))
        })
    }
}

impl StorageWrite for SqliteStore {
    fn insert(&self, insert: InsertDescriptor) -> BoxFuture<'_, QueryResult<Row>> {
        Box::pin(async move {
            let entity = insert.entity.clone();
            self.insert_row(insert)
                .await
                .map_err(|e| QueryError::from(e).with_model(entity))
        })
    }

    fn update(&self, query: QueryDescriptor, values: Row) -> BoxFuture<'_, QueryResult<u64>> {
        Box::pin(async move {
            if values.is_empty() {
                return Ok(0);
            }
            let (affected, _) = self
                .run_statement(sql::update(&query, &values))
                .await
                .map_err(|e| QueryError::from(e).with_model(&query.entity))?;
            Ok(affected)
        })
    }

    fn delete(&self, query: QueryDescriptor) -> BoxFuture<'_, QueryResult<u64>> {
        Box::pin(async move {
            let (affected, _) = self
                .run_statement(sql::delete(&query))
                .await
                .map_err(|e| QueryError::from(e).with_model(&query.entity))?;
            Ok(affected)
        })
    }
}
