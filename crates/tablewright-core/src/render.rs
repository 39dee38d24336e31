//! PostgreSQL DDL rendering.
//!
//! Pure functions from descriptors to SQL text. Statements are returned
//! without a trailing semicolon; the writer terminates them.
//!
//! Default literals for character columns are wrapped in single quotes. This
//! assumes descriptors are written by the application author and is not a
//! general escaping mechanism for user input.

use crate::descriptor::{FieldDescriptor, ForeignKeyDescriptor, IndexDescriptor, NativeType, TableDescriptor};
use crate::types::{alter_type_target, classify};

/// Canonical SQL type for a native type.
#[must_use]
pub fn canonical_type(native: &NativeType) -> &'static str {
    match native {
        NativeType::Bool => "BOOLEAN",
        NativeType::Int
        | NativeType::Int8
        | NativeType::Int16
        | NativeType::Int32
        | NativeType::Uint8
        | NativeType::Uint16
        | NativeType::Uint32 => "INTEGER",
        NativeType::Int64 | NativeType::Uint | NativeType::Uint64 => "BIGINT",
        NativeType::Float32 => "REAL",
        NativeType::Float64 => "DOUBLE PRECISION",
        NativeType::String => "TEXT",
        NativeType::Timestamp => "TIMESTAMPTZ",
        NativeType::Bytes => "BYTEA",
        NativeType::Other(_) => "TEXT",
    }
}

/// Resolves the SQL type of a field.
///
/// Precedence: sized string, explicit type override, serial family for
/// autoincrement columns, canonical mapping.
#[must_use]
pub fn resolve_type(field: &FieldDescriptor) -> String {
    if field.size > 0 && field.native_type == NativeType::String {
        return format!("VARCHAR({})", field.size);
    }

    if let Some(custom) = field.sql_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return custom.to_string();
    }

    if field.autoincrement {
        let bits = if field.size > 0 {
            Some(field.size)
        } else {
            field.native_type.bit_width()
        };
        return match bits {
            Some(16) => "SMALLSERIAL",
            Some(64) => "BIGSERIAL",
            _ => "SERIAL",
        }
        .to_string();
    }

    canonical_type(&field.native_type).to_string()
}

fn is_quoted(literal: &str) -> bool {
    literal.len() >= 2 && literal.starts_with('\'') && literal.ends_with('\'')
}

/// Applies the quoting rule for a default literal on a column of `sql_type`.
#[must_use]
pub fn quote_default(sql_type: &str, literal: &str) -> String {
    if classify(sql_type, None).is_text() && !is_quoted(literal) {
        format!("'{}'", literal.replace('\'', "''"))
    } else {
        literal.to_string()
    }
}

/// Renders the field's default literal, if it has one.
#[must_use]
pub fn render_default(field: &FieldDescriptor) -> Option<String> {
    field
        .default
        .as_deref()
        .map(|literal| quote_default(&resolve_type(field), literal))
}

/// Renders a column clause:
/// `<name> <TYPE> [NOT NULL] [UNIQUE] [DEFAULT <literal>] [CHECK (<expr>)]`.
#[must_use]
pub fn render_column(field: &FieldDescriptor) -> String {
    let mut parts = vec![field.column.clone(), resolve_type(field)];

    if !field.nullable {
        parts.push("NOT NULL".to_string());
    }

    if field.unique {
        parts.push("UNIQUE".to_string());
    }

    if let Some(default) = render_default(field) {
        parts.push(format!("DEFAULT {}", default));
    }

    if let Some(ref check) = field.check {
        parts.push(format!("CHECK ({})", check));
    }

    parts.join(" ")
}

/// Renders `CREATE TABLE IF NOT EXISTS` with every stored column, a single
/// `PRIMARY KEY` clause and the table-level checks.
#[must_use]
pub fn render_create_table(table: &TableDescriptor) -> String {
    let mut clauses: Vec<String> = table.persisted_fields().map(render_column).collect();

    let primary_key = table.primary_key_columns();
    if !primary_key.is_empty() {
        clauses.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
    }

    for check in &table.checks {
        clauses.push(format!("CONSTRAINT {} CHECK ({})", check.name, check.expr));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.name.quoted(),
        clauses.join(", ")
    )
}

/// Renders `CREATE [UNIQUE] INDEX IF NOT EXISTS`.
#[must_use]
pub fn render_index(table: &TableDescriptor, index: &IndexDescriptor) -> String {
    let mut sql = String::from("CREATE ");
    if index.unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str("INDEX IF NOT EXISTS ");
    sql.push_str(&index.name);
    sql.push_str(" ON ");
    sql.push_str(&table.name.quoted());
    sql.push_str(" (");
    sql.push_str(&index.columns.join(", "));
    sql.push(')');
    sql
}

/// Renders `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY`.
#[must_use]
pub fn render_foreign_key(table: &TableDescriptor, fk: &ForeignKeyDescriptor) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
        table.name.quoted(),
        fk.name,
        fk.column,
        fk.target_table,
        fk.target_column,
        fk.on_delete.as_sql(),
        fk.on_update.as_sql()
    )
}

/// Renders `ALTER TABLE ... ADD COLUMN`.
#[must_use]
pub fn render_add_column(table: &TableDescriptor, field: &FieldDescriptor) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        table.name.quoted(),
        render_column(field)
    )
}

/// Renders `ALTER TABLE ... DROP COLUMN IF EXISTS`.
#[must_use]
pub fn render_drop_column(table: &TableDescriptor, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
        table.name.quoted(),
        column
    )
}

/// One clause of a combined `ALTER TABLE` statement for an existing column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterClause {
    /// Change the column type.
    SetType {
        /// Column name.
        column: String,
        /// Expected rendered type.
        sql_type: String,
    },
    /// Forbid NULL.
    SetNotNull(String),
    /// Allow NULL.
    DropNotNull(String),
    /// Change the default.
    SetDefault {
        /// Column name.
        column: String,
        /// Rendered default literal.
        literal: String,
    },
}

impl AlterClause {
    /// Renders the clause.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::SetType { column, sql_type } => {
                format!("ALTER COLUMN {} TYPE {}", column, alter_type_target(sql_type))
            }
            Self::SetNotNull(column) => format!("ALTER COLUMN {} SET NOT NULL", column),
            Self::DropNotNull(column) => format!("ALTER COLUMN {} DROP NOT NULL", column),
            Self::SetDefault { column, literal } => {
                format!("ALTER COLUMN {} SET DEFAULT {}", column, literal)
            }
        }
    }
}

/// Renders every clause for one table as a single `ALTER TABLE` statement.
#[must_use]
pub fn render_alter_column(table: &TableDescriptor, clauses: &[AlterClause]) -> String {
    let rendered: Vec<String> = clauses.iter().map(AlterClause::to_sql).collect();
    format!("ALTER TABLE {} {}", table.name.quoted(), rendered.join(", "))
}
