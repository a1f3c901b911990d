//! SQL rendering for SQLite.
//!
//! Statements use `?` placeholders; every identifier is double-quoted.

use indexmap::IndexMap;
use rusqlite::types::Value as SqlValue;
use weft_query::{
    AssociationKind, AttributeType, EntityType, Filter, QueryDescriptor, Registry, Row, Value,
};

use crate::types::{sql_type, to_sql, to_sql_array};

/// A rendered statement with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Parameters, in placeholder order.
    pub params: Vec<SqlValue>,
}

/// Quote an identifier, escaping embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a filter as a boolean SQL expression.
///
/// Rendering follows [`Filter::matches`]: `NULL` never satisfies a
/// comparison or `IN`, and `NOT` treats an unknown operand as false. `IN`
/// lists bind as a single JSON array, so a large parent set never exceeds
/// SQLite's variable limit.
pub fn render_filter(filter: &Filter, params: &mut Vec<SqlValue>) -> String {
    let bind = |value: &Value, params: &mut Vec<SqlValue>| {
        params.push(to_sql(value));
        "?"
    };

    match filter {
        Filter::None => "1 = 1".to_string(),
        Filter::Equals(col, val) if val.is_null() => format!("{} IS NULL", quote_identifier(col)),
        Filter::Equals(col, val) => format!("{} = {}", quote_identifier(col), bind(val, params)),
        Filter::NotEquals(col, val) if val.is_null() => {
            format!("{} IS NOT NULL", quote_identifier(col))
        }
        Filter::NotEquals(col, val) => {
            let col = quote_identifier(col);
            format!("({col} IS NULL OR {col} <> {})", bind(val, params))
        }
        Filter::Lt(col, val) => format!("{} < {}", quote_identifier(col), bind(val, params)),
        Filter::Lte(col, val) => format!("{} <= {}", quote_identifier(col), bind(val, params)),
        Filter::Gt(col, val) => format!("{} > {}", quote_identifier(col), bind(val, params)),
        Filter::Gte(col, val) => format!("{} >= {}", quote_identifier(col), bind(val, params)),
        Filter::In(col, values) | Filter::NotIn(col, values) => {
            let negated = matches!(filter, Filter::NotIn(..));
            let col = quote_identifier(col);
            let keys: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
            if keys.is_empty() {
                return if negated {
                    format!("{col} IS NOT NULL")
                } else {
                    "0 = 1".to_string()
                };
            }
            // One parameter whatever the list length.
            params.push(to_sql_array(keys));
            let op = if negated { "NOT IN" } else { "IN" };
            format!("{col} {op} (SELECT value FROM json_each(?))")
        }
        Filter::IsNull(col) => format!("{} IS NULL", quote_identifier(col)),
        Filter::IsNotNull(col) => format!("{} IS NOT NULL", quote_identifier(col)),
        Filter::And(filters) if filters.is_empty() => "1 = 1".to_string(),
        Filter::Or(filters) if filters.is_empty() => "0 = 1".to_string(),
        Filter::And(filters) | Filter::Or(filters) => {
            let joiner = if matches!(filter, Filter::And(_)) { " AND " } else { " OR " };
            let parts: Vec<_> = filters.iter().map(|f| render_filter(f, params)).collect();
            format!("({})", parts.join(joiner))
        }
        Filter::Not(inner) => format!("NOT COALESCE(({}), 0)", render_filter(inner, params)),
    }
}

fn where_clause(filter: &Filter, params: &mut Vec<SqlValue>) -> String {
    if filter.is_none() {
        String::new()
    } else {
        format!(" WHERE {}", render_filter(filter, params))
    }
}

/// Render a read in storage (rowid) order.
pub fn select(query: &QueryDescriptor) -> Statement {
    let mut params = Vec::new();
    let mut sql = format!("SELECT * FROM {}", quote_identifier(&query.table));
    sql.push_str(&where_clause(&query.filter, &mut params));
    sql.push_str(" ORDER BY rowid");
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Statement { sql, params }
}

/// Render a single-row insert.
pub fn insert(table: &str, values: &Row) -> Statement {
    if values.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table)),
            params: Vec::new(),
        };
    }
    let columns: Vec<_> = values.keys().map(|c| quote_identifier(c)).collect();
    let placeholders = vec!["?"; values.len()].join(", ");
    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            columns.join(", "),
            placeholders
        ),
        params: values.values().map(to_sql).collect(),
    }
}

/// Render an update of every matching row.
pub fn update(query: &QueryDescriptor, values: &Row) -> Statement {
    let mut params: Vec<SqlValue> = values.values().map(to_sql).collect();
    let assignments: Vec<_> = values
        .keys()
        .map(|c| format!("{} = ?", quote_identifier(c)))
        .collect();
    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_identifier(&query.table),
        assignments.join(", ")
    );
    sql.push_str(&where_clause(&query.filter, &mut params));
    Statement { sql, params }
}

/// Render a delete of every matching row.
pub fn delete(query: &QueryDescriptor) -> Statement {
    let mut params = Vec::new();
    let mut sql = format!("DELETE FROM {}", quote_identifier(&query.table));
    sql.push_str(&where_clause(&query.filter, &mut params));
    Statement { sql, params }
}

/// A foreign key constraint on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    /// `ON DELETE` action.
    pub on_delete: &'static str,
}

/// A table derived from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Primary key columns.
    pub primary_key: Vec<String>,
    /// Columns and their types, in declaration order.
    pub columns: IndexMap<String, AttributeType>,
    /// Foreign key constraints by column.
    pub references: IndexMap<String, Reference>,
}

impl TableDef {
    fn new(name: &str, primary_key: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            primary_key,
            columns: IndexMap::new(),
            references: IndexMap::new(),
        }
    }

    fn add_reference(&mut self, column: &str, ty: AttributeType, reference: Reference) {
        self.columns.entry(column.to_string()).or_insert(ty);
        self.references.entry(column.to_string()).or_insert(reference);
    }

    /// `CREATE TABLE IF NOT EXISTS` statement.
    ///
    /// A single integer primary key becomes the rowid alias, so SQLite
    /// generates it on insert.
    pub fn create_sql(&self) -> String {
        let single_integer_key = match self.primary_key.as_slice() {
            [key] => self.columns.get(key) == Some(&AttributeType::Integer),
            _ => false,
        };

        let mut parts = Vec::with_capacity(self.columns.len() + 1);
        for (name, ty) in &self.columns {
            let mut column = format!("{} {}", quote_identifier(name), sql_type(*ty));
            if single_integer_key && self.primary_key[0] == *name {
                column.push_str(" PRIMARY KEY");
            }
            if let Some(reference) = self.references.get(name) {
                column.push_str(&format!(
                    " REFERENCES {} ({}) ON DELETE {}",
                    quote_identifier(&reference.table),
                    quote_identifier(&reference.column),
                    reference.on_delete
                ));
            }
            parts.push(column);
        }
        if !single_integer_key && !self.primary_key.is_empty() {
            let keys: Vec<_> = self.primary_key.iter().map(|k| quote_identifier(k)).collect();
            parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(&self.name),
            parts.join(", ")
        )
    }

    /// `DROP TABLE IF EXISTS` statement.
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_identifier(&self.name))
    }
}

/// Derive one table per entity type and join record.
///
/// Foreign key columns implied by associations are added to the owning
/// table with the type of the referenced primary key.
pub fn table_defs(registry: &Registry) -> Vec<TableDef> {
    let mut tables: IndexMap<String, TableDef> = IndexMap::new();
    for entity in registry.entities() {
        let mut table = TableDef::new(
            entity.table_name(),
            vec![entity.primary_key_name().to_string()],
        );
        table.columns = entity.attributes().clone();
        tables.insert(entity.table_name().to_string(), table);
    }

    for entity in registry.entities() {
        for association in registry.associations_of(entity.name()) {
            let source = &association.source;
            let target = &association.target;
            match association.kind {
                AssociationKind::ManyToMany => {
                    let Some(through) = &association.through else {
                        continue;
                    };
                    let table = tables
                        .entry(through.record.table.clone())
                        .or_insert_with(|| {
                            TableDef::new(
                                &through.record.table,
                                vec![through.source_key.clone(), through.target_key.clone()],
                            )
                        });
                    table.add_reference(
                        &through.source_key,
                        pk_type(source),
                        Reference {
                            table: source.table_name().to_string(),
                            column: source.primary_key_name().to_string(),
                            on_delete: "CASCADE",
                        },
                    );
                    table.add_reference(
                        &through.target_key,
                        pk_type(target),
                        Reference {
                            table: target.table_name().to_string(),
                            column: target.primary_key_name().to_string(),
                            on_delete: "CASCADE",
                        },
                    );
                }
                kind => {
                    let (owner, referenced) = if kind.foreign_key_on_source() {
                        (source, target)
                    } else {
                        (target, source)
                    };
                    if let Some(table) = tables.get_mut(owner.table_name()) {
                        table.add_reference(
                            &association.foreign_key,
                            pk_type(referenced),
                            Reference {
                                table: referenced.table_name().to_string(),
                                column: referenced.primary_key_name().to_string(),
                                on_delete: "SET NULL",
                            },
                        );
                    }
                }
            }
        }
    }

    tables.into_values().collect()
}

fn pk_type(entity: &EntityType) -> AttributeType {
    entity
        .attribute_type(entity.primary_key_name())
        .unwrap_or(AttributeType::Integer)
}
