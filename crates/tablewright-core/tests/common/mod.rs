#![allow(dead_code)]

//! An in-memory schema that executes the statements the generator emits and
//! reports the result the way PostgreSQL's catalog does: serial columns as
//! NOT NULL `int4`/`int8` with a `nextval` default, arrays as `_<elem>`,
//! quoted defaults with a trailing cast.

use std::collections::BTreeMap;

use tablewright_core::prelude::*;
use tablewright_core::types::{classify, TypeClass};

#[derive(Debug, Clone, Default)]
struct LiveTable {
    columns: Vec<ColumnSnapshot>,
    indexes: Vec<IndexSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct AppliedSchema {
    tables: BTreeMap<String, LiveTable>,
}

impl AppliedSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a table, e.g. one that has drifted from its descriptor.
    pub fn with_table(mut self, name: &str, columns: Vec<ColumnSnapshot>, indexes: Vec<IndexSnapshot>) -> Self {
        self.tables
            .insert(TableName::parse(name).to_string(), LiveTable { columns, indexes });
        self
    }

    /// Snapshot of the current state for the differ.
    pub fn introspector(&self) -> MemoryIntrospector {
        self.tables
            .iter()
            .fold(MemoryIntrospector::new(), |db, (name, table)| {
                db.table(name, table.columns.clone(), table.indexes.clone())
            })
    }

    pub fn apply_all(&mut self, changes: &[SchemaChange]) {
        for change in changes {
            self.apply(change);
        }
    }

    /// Executes one emitted statement. Panics on anything the generator
    /// does not produce.
    pub fn apply(&mut self, change: &SchemaChange) {
        let sql = change.sql.as_str();
        if let Some(rest) = sql.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
            let (name, body) = rest
                .split_once(" (")
                .unwrap_or_else(|| panic!("Malformed CREATE TABLE: {sql}"));
            let body = body
                .strip_suffix(')')
                .unwrap_or_else(|| panic!("Unterminated CREATE TABLE: {sql}"));
            self.create_table(&table_key(name), body);
        } else if let Some(rest) = sql.strip_prefix("CREATE UNIQUE INDEX IF NOT EXISTS ") {
            self.create_index(rest, true);
        } else if let Some(rest) = sql.strip_prefix("CREATE INDEX IF NOT EXISTS ") {
            self.create_index(rest, false);
        } else if let Some(rest) = sql.strip_prefix("ALTER TABLE ") {
            let (name, action) = rest
                .split_once(' ')
                .unwrap_or_else(|| panic!("Malformed ALTER TABLE: {sql}"));
            let key = table_key(name);
            if let Some(definition) = action.strip_prefix("ADD COLUMN ") {
                let column = column_from_clause(&key, definition);
                self.table_mut(&key).columns.push(column);
            } else if let Some(column) = action.strip_prefix("DROP COLUMN IF EXISTS ") {
                self.table_mut(&key)
                    .columns
                    .retain(|c| !c.name.eq_ignore_ascii_case(column));
            } else if action.starts_with("ADD CONSTRAINT ") {
                // Foreign keys are not introspected.
            } else if let Some(clauses) = action.strip_prefix("ALTER COLUMN ") {
                for clause in clauses.split(", ALTER COLUMN ") {
                    self.alter_column(&key, clause);
                }
            } else {
                panic!("Unsupported ALTER TABLE: {sql}");
            }
        } else {
            panic!("Unsupported statement: {sql}");
        }
    }

    fn table_mut(&mut self, key: &str) -> &mut LiveTable {
        self.tables
            .get_mut(key)
            .unwrap_or_else(|| panic!("No such table: {key}"))
    }

    fn create_table(&mut self, key: &str, body: &str) {
        if self.tables.contains_key(key) {
            return;
        }
        let mut table = LiveTable::default();
        for clause in split_top_level(body) {
            if let Some(columns) = clause.strip_prefix("PRIMARY KEY (") {
                for name in columns.trim_end_matches(')').split(", ") {
                    if let Some(column) = table
                        .columns
                        .iter_mut()
                        .find(|c| c.name.eq_ignore_ascii_case(name))
                    {
                        column.nullable = Some(false);
                    }
                }
            } else if !clause.starts_with("CONSTRAINT ") {
                table.columns.push(column_from_clause(key, clause));
            }
        }
        self.tables.insert(key.to_string(), table);
    }

    fn create_index(&mut self, rest: &str, unique: bool) {
        let (name, target) = rest
            .split_once(" ON ")
            .unwrap_or_else(|| panic!("Malformed CREATE INDEX: {rest}"));
        let (table, _) = target
            .split_once(' ')
            .unwrap_or_else(|| panic!("Malformed CREATE INDEX: {rest}"));
        let indexes = &mut self.table_mut(&table_key(table)).indexes;
        if !indexes.iter().any(|i| i.name.eq_ignore_ascii_case(name)) {
            indexes.push(IndexSnapshot::new(name.to_ascii_lowercase(), unique));
        }
    }

    fn alter_column(&mut self, key: &str, clause: &str) {
        let (name, action) = clause
            .split_once(' ')
            .unwrap_or_else(|| panic!("Malformed ALTER COLUMN: {clause}"));
        let column = self
            .table_mut(key)
            .columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .unwrap_or_else(|| panic!("No such column: {key}.{name}"));

        if let Some(sql_type) = action.strip_prefix("TYPE ") {
            let (type_name, length) = reported_type(sql_type);
            column.type_name = type_name;
            column.length = length;
        } else if action == "SET NOT NULL" {
            column.nullable = Some(false);
        } else if action == "DROP NOT NULL" {
            column.nullable = Some(true);
        } else if let Some(literal) = action.strip_prefix("SET DEFAULT ") {
            column.default = Some(reported_default(&column.type_name, literal));
        } else {
            panic!("Unsupported ALTER COLUMN: {clause}");
        }
    }
}

/// `public."Accounts"` to `public.Accounts`.
fn table_key(quoted: &str) -> String {
    TableName::parse(&quoted.replace('"', "")).to_string()
}

/// Splits on commas outside parentheses and quotes.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                parts.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(body[start..].trim());
    parts
}

/// Parses `<name> <TYPE> [NOT NULL] [UNIQUE] [DEFAULT <literal>] [CHECK (..)]`.
fn column_from_clause(key: &str, clause: &str) -> ColumnSnapshot {
    let (name, rest) = clause
        .split_once(' ')
        .unwrap_or_else(|| panic!("Malformed column: {clause}"));
    let type_end = [" NOT NULL", " UNIQUE", " DEFAULT ", " CHECK ("]
        .iter()
        .filter_map(|keyword| rest.find(keyword))
        .min()
        .unwrap_or(rest.len());
    let sql_type = rest[..type_end].trim();
    let modifiers = &rest[type_end..];

    let serial = sql_type.to_ascii_uppercase().contains("SERIAL");
    let (type_name, length) = reported_type(sql_type);
    let mut column = ColumnSnapshot::new(name, type_name);
    column.length = length;
    column.nullable = Some(!(serial || modifiers.contains(" NOT NULL")));

    let literal = modifiers
        .split_once(" DEFAULT ")
        .map(|(_, d)| d.split(" CHECK (").next().unwrap_or(d).trim());
    column.default = match literal {
        Some(literal) => Some(reported_default(sql_type, literal)),
        None if serial => {
            let entity = key.rsplit('.').next().unwrap_or(key);
            Some(format!("nextval('\"{entity}_{name}_seq\"'::regclass)"))
        }
        None => None,
    };
    column
}

/// The `udt_name` and character length the catalog reports for a type.
fn reported_type(sql_type: &str) -> (String, Option<u32>) {
    let class = classify(sql_type, None);
    let length = match class {
        TypeClass::Varchar(length) | TypeClass::Char(length) => length,
        _ => None,
    };
    (udt_name(&class), length)
}

fn udt_name(class: &TypeClass) -> String {
    match class {
        TypeClass::SmallInt => "int2".to_string(),
        TypeClass::Integer => "int4".to_string(),
        TypeClass::BigInt => "int8".to_string(),
        TypeClass::Real => "float4".to_string(),
        TypeClass::Double => "float8".to_string(),
        TypeClass::Numeric => "numeric".to_string(),
        TypeClass::Boolean => "bool".to_string(),
        TypeClass::Text => "text".to_string(),
        TypeClass::Varchar(_) => "varchar".to_string(),
        TypeClass::Char(_) => "bpchar".to_string(),
        TypeClass::Timestamp => "timestamp".to_string(),
        TypeClass::TimestampTz => "timestamptz".to_string(),
        TypeClass::Date => "date".to_string(),
        TypeClass::Time => "time".to_string(),
        TypeClass::TimeTz => "timetz".to_string(),
        TypeClass::Bytea => "bytea".to_string(),
        TypeClass::Uuid => "uuid".to_string(),
        TypeClass::Json => "json".to_string(),
        TypeClass::Jsonb => "jsonb".to_string(),
        TypeClass::Array(element) => format!("_{}", udt_name(element)),
        TypeClass::Other(name) => name.to_ascii_lowercase(),
    }
}

/// Name used in the cast PostgreSQL appends to a quoted default.
fn cast_name(class: &TypeClass) -> String {
    match class {
        TypeClass::SmallInt => "smallint".to_string(),
        TypeClass::Integer => "integer".to_string(),
        TypeClass::BigInt => "bigint".to_string(),
        TypeClass::Varchar(_) => "character varying".to_string(),
        TypeClass::TimestampTz => "timestamp with time zone".to_string(),
        TypeClass::Array(element) => format!("{}[]", cast_name(element)),
        other => udt_name(other),
    }
}

/// `'free'` comes back as `'free'::text`, `-1` as `'-1'::integer`.
fn reported_default(type_name: &str, literal: &str) -> String {
    let class = classify(type_name, None);
    if literal.starts_with('\'') {
        format!("{literal}::{}", cast_name(&class))
    } else if literal.starts_with('-') {
        format!("'{literal}'::{}", cast_name(&class))
    } else {
        literal.to_string()
    }
}
