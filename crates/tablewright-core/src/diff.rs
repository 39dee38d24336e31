//! Descriptor-versus-database diffing.
//!
//! A table is either absent, in which case the full creation sequence is
//! emitted, or present, in which case columns and indexes are compared
//! independently. Index diffing is additive only: live indexes that no
//! descriptor declares are left alone.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::change::{ChangeKind, SchemaChange};
use crate::descriptor::{FieldDescriptor, TableDescriptor};
use crate::error::{GenerateError, IntrospectError, Result};
use crate::introspect::{ColumnSnapshot, IntrospectionAspect, Introspector};
use crate::render::{
    quote_default, render_add_column, render_alter_column, render_create_table, render_default,
    render_drop_column, render_foreign_key, render_index, resolve_type, AlterClause,
};
use crate::types::{classify, types_equivalent};

/// Trailing `::type` casts PostgreSQL appends to reported defaults.
static TRAILING_CASTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:::[A-Za-z_][A-Za-z0-9_ ."]*(?:\[\])?)+$"#).expect("valid cast pattern")
});

/// What to do when an introspection query fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntrospectionPolicy {
    /// Log, record a [`Degradation`] and treat the aspect as unknown.
    #[default]
    Degrade,
    /// Abort the run with [`GenerateError::Introspection`].
    FailFast,
}

/// An introspection failure that was tolerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradation {
    /// Table being diffed.
    pub table: String,
    /// What could not be read.
    pub aspect: IntrospectionAspect,
    /// Underlying failure.
    pub error: IntrospectError,
}

/// Changes found for one or more tables, plus any tolerated failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    /// Changes in table iteration order.
    pub changes: Vec<SchemaChange>,
    /// Introspection failures that were skipped over.
    pub degradations: Vec<Degradation>,
}

impl DiffOutcome {
    /// Returns true if the descriptors matched the database and nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty() && self.degradations.is_empty()
    }

    /// Appends another outcome.
    pub fn extend(&mut self, other: Self) {
        self.changes.extend(other.changes);
        self.degradations.extend(other.degradations);
    }
}

/// Returns the creation sequence for a table that does not exist yet:
/// the table, then its indexes, then its foreign keys.
#[must_use]
pub fn create_changes(table: &TableDescriptor) -> Vec<SchemaChange> {
    let name = table.name.to_string();
    let mut changes = vec![SchemaChange::new(
        ChangeKind::CreateTable,
        &name,
        render_create_table(table),
    )];

    for index in &table.indexes {
        changes.push(SchemaChange::new(
            ChangeKind::AddIndex,
            &name,
            render_index(table, index),
        ));
    }

    for fk in &table.foreign_keys {
        changes.push(SchemaChange::new(
            ChangeKind::AddForeignKey,
            &name,
            render_foreign_key(table, fk),
        ));
    }

    changes
}

/// Strips trailing casts from a reported default, e.g. `'x'::text` to `'x'`.
#[must_use]
pub fn normalize_default(reported: &str) -> String {
    TRAILING_CASTS.replace(reported.trim(), "").trim().to_string()
}

fn unquote(literal: &str) -> &str {
    literal
        .strip_prefix('\'')
        .and_then(|l| l.strip_suffix('\''))
        .unwrap_or(literal)
}

/// Compares a rendered default against the one the database reports.
fn defaults_match(sql_type: &str, expected: &str, reported: &str) -> bool {
    let actual = quote_default(sql_type, &normalize_default(reported));
    if actual == expected {
        return true;
    }
    // Non-text literals come back quoted and cast: `'-1'::integer`, `'f'::boolean`.
    !classify(sql_type, None).is_text() && unquote(&actual).eq_ignore_ascii_case(unquote(expected))
}

/// Compares one declared field against its live column.
///
/// Returns the clauses needed to bring the column in line, in type,
/// nullability, default order.
#[must_use]
pub fn detect_modifications(field: &FieldDescriptor, column: &ColumnSnapshot) -> Vec<AlterClause> {
    let sql_type = resolve_type(field);
    let mut clauses = Vec::new();

    if !types_equivalent(&sql_type, &column.type_name, column.length) {
        clauses.push(AlterClause::SetType {
            column: field.column.clone(),
            sql_type: sql_type.clone(),
        });
    }

    // Primary keys and serial columns are always NOT NULL.
    let expected_nullable = field.nullable && !field.primary_key && !field.autoincrement;
    if let Some(actual_nullable) = column.nullable {
        if actual_nullable != expected_nullable {
            clauses.push(if expected_nullable {
                AlterClause::DropNotNull(field.column.clone())
            } else {
                AlterClause::SetNotNull(field.column.clone())
            });
        }
    }

    if let Some(expected) = render_default(field) {
        let matches = column
            .default
            .as_deref()
            .is_some_and(|reported| defaults_match(&sql_type, &expected, reported));
        if !matches {
            clauses.push(AlterClause::SetDefault {
                column: field.column.clone(),
                literal: expected,
            });
        }
    }

    clauses
}

/// Compares table descriptors against a live database.
pub struct Differ<'a, I> {
    introspector: &'a I,
    policy: IntrospectionPolicy,
}

impl<'a, I: Introspector> Differ<'a, I> {
    /// Creates a differ with the default [`IntrospectionPolicy::Degrade`].
    #[must_use]
    pub fn new(introspector: &'a I) -> Self {
        Self {
            introspector,
            policy: IntrospectionPolicy::default(),
        }
    }

    /// Sets the introspection failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: IntrospectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Diffs every table, accumulating changes in table order.
    pub async fn diff_all(&self, tables: &[TableDescriptor]) -> Result<DiffOutcome> {
        let mut outcome = DiffOutcome::default();
        for table in tables {
            outcome.extend(self.diff_table(table).await?);
        }
        Ok(outcome)
    }

    /// Diffs one table.
    pub async fn diff_table(&self, table: &TableDescriptor) -> Result<DiffOutcome> {
        let mut outcome = DiffOutcome::default();

        let exists = self.introspector.has_table(&table.name).await;
        let Some(exists) = self.settle(table, IntrospectionAspect::Table, exists, &mut outcome)? else {
            return Ok(outcome);
        };

        if exists {
            debug!(table = %table.name, "Table present, comparing columns and indexes");
            self.diff_columns(table, &mut outcome).await?;
            self.diff_indexes(table, &mut outcome).await?;
        } else {
            debug!(table = %table.name, "Table absent, emitting creation sequence");
            outcome.changes.extend(create_changes(table));
        }

        for change in &outcome.changes {
            debug!(table = %table.name, kind = ?change.kind, sql = %change.sql, "Change detected");
        }
        Ok(outcome)
    }

    async fn diff_columns(&self, table: &TableDescriptor, outcome: &mut DiffOutcome) -> Result<()> {
        let name = table.name.to_string();
        let snapshots = self.introspector.column_types(&table.name).await;
        let snapshots = self.settle(table, IntrospectionAspect::ColumnTypes, snapshots, outcome)?;

        for field in table.persisted_fields() {
            let present = self.introspector.has_column(&table.name, &field.column).await;
            let Some(present) = self.settle(table, IntrospectionAspect::Column, present, outcome)? else {
                continue;
            };

            if !present {
                outcome.changes.push(SchemaChange::new(
                    ChangeKind::AddColumn,
                    &name,
                    render_add_column(table, field),
                ));
                continue;
            }

            let live = snapshots
                .iter()
                .flatten()
                .find(|c| c.name.eq_ignore_ascii_case(&field.column));
            if let Some(live) = live {
                let clauses = detect_modifications(field, live);
                if !clauses.is_empty() {
                    outcome.changes.push(SchemaChange::new(
                        ChangeKind::ModifyColumn,
                        &name,
                        render_alter_column(table, &clauses),
                    ));
                }
            }
        }

        for live in snapshots.iter().flatten() {
            if table.field_by_column(&live.name).is_none() {
                outcome.changes.push(SchemaChange::new(
                    ChangeKind::DropColumn,
                    &name,
                    render_drop_column(table, &live.name),
                ));
            }
        }

        Ok(())
    }

    async fn diff_indexes(&self, table: &TableDescriptor, outcome: &mut DiffOutcome) -> Result<()> {
        let live = self.introspector.get_indexes(&table.name).await;
        let Some(live) = self.settle(table, IntrospectionAspect::Indexes, live, outcome)? else {
            return Ok(());
        };

        for index in &table.indexes {
            if !live.iter().any(|l| l.name.eq_ignore_ascii_case(&index.name)) {
                outcome.changes.push(SchemaChange::new(
                    ChangeKind::AddIndex,
                    table.name.to_string(),
                    render_index(table, index),
                ));
            }
        }

        Ok(())
    }

    /// Applies the policy to an introspection result. `Ok(None)` means the
    /// failure was tolerated and the aspect contributes no changes.
    fn settle<T>(
        &self,
        table: &TableDescriptor,
        aspect: IntrospectionAspect,
        result: std::result::Result<T, IntrospectError>,
        outcome: &mut DiffOutcome,
    ) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) => match self.policy {
                IntrospectionPolicy::FailFast => Err(GenerateError::Introspection {
                    table: table.name.to_string(),
                    source: error,
                }),
                IntrospectionPolicy::Degrade => {
                    warn!(table = %table.name, %aspect, %error, "Introspection failed, skipping");
                    outcome.degradations.push(Degradation {
                        table: table.name.to_string(),
                        aspect,
                        error,
                    });
                    Ok(None)
                }
            },
        }
    }
}
