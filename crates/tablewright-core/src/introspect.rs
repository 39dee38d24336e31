//! Schema introspection boundary.
//!
//! Driver crates (tablewright-postgres) implement [`Introspector`] to read
//! the live structure of a table. The core crate only defines the trait and
//! an in-memory implementation, so it stays driver-agnostic.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::descriptor::{TableDescriptor, TableName};
use crate::error::IntrospectError;
use crate::render::{render_default, resolve_type};
use crate::types::alter_type_target;

/// A live column as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSnapshot {
    /// Column name.
    pub name: String,
    /// Reported type name (e.g. `int8`, `varchar`, `timestamptz`).
    pub type_name: String,
    /// Reported character length, if any.
    pub length: Option<u32>,
    /// Nullability, `None` when unknown.
    pub nullable: Option<bool>,
    /// Reported default expression.
    pub default: Option<String>,
}

impl ColumnSnapshot {
    /// Creates a snapshot with unknown nullability and no default.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            length: None,
            nullable: None,
            default: None,
        }
    }

    /// Sets the reported nullability.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Sets the reported character length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets the reported default expression.
    #[must_use]
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A live index as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSnapshot {
    /// Index name.
    pub name: String,
    /// Whether the index is unique.
    pub unique: bool,
}

impl IndexSnapshot {
    /// Creates an index snapshot.
    #[must_use]
    pub fn new(name: impl Into<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            unique,
        }
    }
}

/// The piece of structure an introspection query was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrospectionAspect {
    /// Table existence.
    Table,
    /// Existence of one column.
    Column,
    /// Column types, nullability and defaults.
    ColumnTypes,
    /// Index list.
    Indexes,
}

impl fmt::Display for IntrospectionAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table existence",
            Self::Column => "column existence",
            Self::ColumnTypes => "column types",
            Self::Indexes => "indexes",
        })
    }
}

/// Read-only access to the live structure of tables.
///
/// Queries are awaited one at a time; implementations need not be `Sync`.
#[allow(async_fn_in_trait)]
pub trait Introspector {
    /// Returns whether the table exists.
    async fn has_table(&self, table: &TableName) -> Result<bool, IntrospectError>;

    /// Returns whether the table has the column.
    async fn has_column(&self, table: &TableName, column: &str) -> Result<bool, IntrospectError>;

    /// Returns the table's columns in ordinal order.
    async fn column_types(&self, table: &TableName) -> Result<Vec<ColumnSnapshot>, IntrospectError>;

    /// Returns the table's non-primary indexes.
    async fn get_indexes(&self, table: &TableName) -> Result<Vec<IndexSnapshot>, IntrospectError>;
}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<ColumnSnapshot>,
    indexes: Vec<IndexSnapshot>,
}

/// In-memory database structure, for tests and offline planning.
///
/// Individual aspects can be made to fail to exercise degraded runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryIntrospector {
    tables: BTreeMap<String, MemoryTable>,
    failing: HashSet<IntrospectionAspect>,
}

impl MemoryIntrospector {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a table.
    #[must_use]
    pub fn table(mut self, name: &str, columns: Vec<ColumnSnapshot>, indexes: Vec<IndexSnapshot>) -> Self {
        self.tables.insert(
            TableName::parse(name).to_string(),
            MemoryTable { columns, indexes },
        );
        self
    }

    /// Makes every query for `aspect` fail.
    #[must_use]
    pub fn failing(mut self, aspect: IntrospectionAspect) -> Self {
        self.failing.insert(aspect);
        self
    }

    /// Brings the table to the state a fully applied script for `table`
    /// leaves behind, reporting types and defaults the way PostgreSQL does.
    ///
    /// Indexes already present are kept; declared ones are added.
    pub fn apply_descriptor(&mut self, table: &TableDescriptor) {
        let columns = table
            .persisted_fields()
            .map(|field| {
                let sql_type = resolve_type(field);
                let mut snapshot = ColumnSnapshot::new(
                    &field.column,
                    alter_type_target(&sql_type).to_ascii_lowercase(),
                )
                .nullable(field.nullable && !field.primary_key && !field.autoincrement);
                snapshot.default = match render_default(field) {
                    Some(default) if default.starts_with('\'') => Some(format!("{default}::text")),
                    Some(default) => Some(default),
                    None if field.autoincrement => Some(format!(
                        "nextval('{}_{}_seq'::regclass)",
                        table.name.entity, field.column
                    )),
                    None => None,
                };
                snapshot
            })
            .collect();

        let entry = self.tables.entry(table.name.to_string()).or_default();
        entry.columns = columns;
        for index in &table.indexes {
            if !entry
                .indexes
                .iter()
                .any(|i| i.name.eq_ignore_ascii_case(&index.name))
            {
                entry
                    .indexes
                    .push(IndexSnapshot::new(index.name.to_ascii_lowercase(), index.unique));
            }
        }
    }

    fn check(&self, aspect: IntrospectionAspect, query: &'static str) -> Result<(), IntrospectError> {
        if self.failing.contains(&aspect) {
            Err(IntrospectError::Query {
                query,
                message: "simulated failure".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn lookup(&self, table: &TableName) -> Option<&MemoryTable> {
        self.tables.get(&table.to_string())
    }
}

impl Introspector for MemoryIntrospector {
    async fn has_table(&self, table: &TableName) -> Result<bool, IntrospectError> {
        self.check(IntrospectionAspect::Table, "has_table")?;
        Ok(self.lookup(table).is_some())
    }

    async fn has_column(&self, table: &TableName, column: &str) -> Result<bool, IntrospectError> {
        self.check(IntrospectionAspect::Column, "has_column")?;
        Ok(self.lookup(table).is_some_and(|t| {
            t.columns.iter().any(|c| c.name.eq_ignore_ascii_case(column))
        }))
    }

    async fn column_types(&self, table: &TableName) -> Result<Vec<ColumnSnapshot>, IntrospectError> {
        self.check(IntrospectionAspect::ColumnTypes, "column_types")?;
        Ok(self.lookup(table).map(|t| t.columns.clone()).unwrap_or_default())
    }

    async fn get_indexes(&self, table: &TableName) -> Result<Vec<IndexSnapshot>, IntrospectError> {
        self.check(IntrospectionAspect::Indexes, "get_indexes")?;
        Ok(self.lookup(table).map(|t| t.indexes.clone()).unwrap_or_default())
    }
}
