//! Table descriptors and the builders that produce them.
//!
//! A [`TableDescriptor`] is the declarative description of one table: its
//! columns, indexes, foreign keys and check constraints. Descriptors come
//! from an [`EntityModel`], either a hand-written builder function or a
//! declarative [`EntityDefinition`] loaded from a model file.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DescriptorError;

/// Native field type of an entity, before it is mapped to a SQL type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NativeType {
    /// Boolean.
    Bool,
    /// Platform-sized signed integer (treated as 32-bit).
    Int,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// Platform-sized unsigned integer (treated as 64-bit).
    Uint,
    /// 8-bit unsigned integer.
    Uint8,
    /// 16-bit unsigned integer.
    Uint16,
    /// 32-bit unsigned integer.
    Uint32,
    /// 64-bit unsigned integer.
    Uint64,
    /// Single precision float.
    Float32,
    /// Double precision float.
    Float64,
    /// Text.
    String,
    /// Point in time.
    Timestamp,
    /// Byte sequence.
    Bytes,
    /// Any type without a canonical mapping.
    Other(String),
}

impl NativeType {
    /// Returns the bit width of integer types.
    #[must_use]
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            Self::Int8 | Self::Uint8 => Some(8),
            Self::Int16 | Self::Uint16 => Some(16),
            Self::Int | Self::Int32 | Self::Uint32 => Some(32),
            Self::Int64 | Self::Uint | Self::Uint64 => Some(64),
            _ => None,
        }
    }

    /// Returns the canonical name used in model files.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Timestamp => "timestamp",
            Self::Bytes => "bytes",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for NativeType {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Self::Bool,
            "int" => Self::Int,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint" => Self::Uint,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "float32" => Self::Float32,
            "float64" | "float" => Self::Float64,
            "string" | "str" => Self::String,
            "timestamp" | "time" | "datetime" => Self::Timestamp,
            "bytes" | "[]byte" => Self::Bytes,
            _ => Self::Other(name.to_string()),
        }
    }
}

impl From<String> for NativeType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<NativeType> for String {
    fn from(native: NativeType) -> Self {
        native.as_str().to_string()
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Referential action for ON DELETE / ON UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReferentialAction {
    /// Reject the change while referencing rows exist.
    #[default]
    Restrict,
    /// Propagate the change to referencing rows.
    Cascade,
    /// Set the referencing column to NULL.
    SetNull,
    /// Set the referencing column to its default.
    SetDefault,
    /// Deferred check.
    NoAction,
}

impl ReferentialAction {
    /// Returns the SQL keyword(s).
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::NoAction => "NO ACTION",
        }
    }
}

impl FromStr for ReferentialAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('_', " ");
        match normalized.as_str() {
            "RESTRICT" => Ok(Self::Restrict),
            "CASCADE" => Ok(Self::Cascade),
            "SET NULL" => Ok(Self::SetNull),
            "SET DEFAULT" => Ok(Self::SetDefault),
            "NO ACTION" => Ok(Self::NoAction),
            _ => Err(format!("unknown referential action '{s}'")),
        }
    }
}

impl TryFrom<String> for ReferentialAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReferentialAction> for String {
    fn from(action: ReferentialAction) -> Self {
        action.as_sql().to_string()
    }
}

/// A table name, optionally qualified with a schema (`schema.Entity`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    /// Schema part, if the name was qualified.
    pub schema: Option<String>,
    /// Entity part.
    pub entity: String,
}

impl TableName {
    /// Parses a possibly qualified table name.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.split_once('.') {
            Some((schema, entity)) if !schema.is_empty() => Self {
                schema: Some(schema.to_string()),
                entity: entity.to_string(),
            },
            _ => Self {
                schema: None,
                entity: name.trim_start_matches('.').to_string(),
            },
        }
    }

    /// Renders the name for DDL: only the entity portion is quoted.
    #[must_use]
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.\"{}\"", schema, self.entity),
            None => format!("\"{}\"", self.entity),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.entity),
            None => f.write_str(&self.entity),
        }
    }
}

/// Description of one entity field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Logical field name.
    pub name: String,
    /// Database column name; empty for fields that are not stored.
    pub column: String,
    /// Native type.
    pub native_type: NativeType,
    /// Size hint: string length, or integer width for autoincrement columns.
    pub size: u32,
    /// Whether the column allows NULL.
    pub nullable: bool,
    /// Whether the column carries a UNIQUE constraint.
    pub unique: bool,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
    /// Whether the column is backed by a sequence.
    pub autoincrement: bool,
    /// Default value literal, as written by the model author.
    pub default: Option<String>,
    /// Inline CHECK expression.
    pub check: Option<String>,
    /// Explicit SQL type, overriding the canonical mapping.
    pub sql_type: Option<String>,
}

impl FieldDescriptor {
    /// Creates a nullable field whose column is named after the field.
    #[must_use]
    pub fn new(name: impl Into<String>, native_type: impl Into<NativeType>) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            native_type: native_type.into(),
            size: 0,
            nullable: true,
            unique: false,
            primary_key: false,
            autoincrement: false,
            default: None,
            check: None,
            sql_type: None,
        }
    }

    /// Sets the database column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Marks the field as not stored in the table.
    #[must_use]
    pub fn computed(mut self) -> Self {
        self.column = String::new();
        self
    }

    /// Sets the size hint.
    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds the column to the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Sets the default value literal.
    #[must_use]
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    /// Sets an inline check expression.
    #[must_use]
    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.check = Some(expr.into());
        self
    }

    /// Overrides the SQL type.
    #[must_use]
    pub fn sql_type(mut self, sql_type: impl Into<String>) -> Self {
        self.sql_type = Some(sql_type.into());
        self
    }

    /// Returns whether the field has a column in the table.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.column.is_empty()
    }
}

/// Description of a declared index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// Member columns, in order.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub unique: bool,
}

impl IndexDescriptor {
    /// Creates a non-unique index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique: false,
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Description of a foreign key derived from a belongs-to relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKeyDescriptor {
    /// Constraint name.
    pub name: String,
    /// Referencing column in this table.
    pub column: String,
    /// Referenced table, rendered as declared.
    pub target_table: String,
    /// Referenced column.
    pub target_column: String,
    /// Action on delete.
    pub on_delete: ReferentialAction,
    /// Action on update.
    pub on_update: ReferentialAction,
}

impl ForeignKeyDescriptor {
    /// Builds the foreign key for `entity` belonging to `target_table`.
    ///
    /// The constraint name is `fk_<entity>_<column>`, so it is stable across runs.
    #[must_use]
    pub fn belongs_to(
        entity: &str,
        column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        let column = column.into();
        Self {
            name: format!("fk_{entity}_{column}"),
            column,
            target_table: target_table.into(),
            target_column: target_column.into(),
            on_delete: ReferentialAction::default(),
            on_update: ReferentialAction::default(),
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }
}

/// A named table-level check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,
    /// Boolean SQL expression.
    pub expr: String,
}

/// Complete description of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Logical entity name, used for derived constraint names.
    pub entity: String,
    /// Table name.
    pub name: TableName,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Declared indexes.
    pub indexes: Vec<IndexDescriptor>,
    /// Declared foreign keys.
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    /// Table-level check constraints.
    pub checks: Vec<CheckConstraint>,
}

impl TableDescriptor {
    /// Creates an empty descriptor.
    #[must_use]
    pub fn new(entity: impl Into<String>, table: &str) -> Self {
        Self {
            entity: entity.into(),
            name: TableName::parse(table),
            fields: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKeyDescriptor) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Declares a belongs-to relation with default RESTRICT actions.
    #[must_use]
    pub fn belongs_to(self, column: &str, target_table: &str, target_column: &str) -> Self {
        let fk = ForeignKeyDescriptor::belongs_to(&self.entity, column, target_table, target_column);
        self.foreign_key(fk)
    }

    /// Adds a table-level check constraint.
    #[must_use]
    pub fn check(mut self, name: impl Into<String>, expr: impl Into<String>) -> Self {
        self.checks.push(CheckConstraint {
            name: name.into(),
            expr: expr.into(),
        });
        self
    }

    /// Fields that have a column in the table.
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_persisted())
    }

    /// Columns flagged as primary key, in field order.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.persisted_fields()
            .filter(|f| f.primary_key)
            .map(|f| f.column.as_str())
            .collect()
    }

    /// Looks up a persisted field by column name, ignoring ASCII case.
    #[must_use]
    pub fn field_by_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.persisted_fields()
            .find(|f| f.column.eq_ignore_ascii_case(column))
    }

    /// Checks structural consistency.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Invalid`] for empty names, duplicate
    /// columns, or indexes and foreign keys naming unknown columns.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let table = self.name.to_string();
        if self.name.entity.trim().is_empty() {
            return Err(DescriptorError::invalid(table, "table name is empty"));
        }

        let mut seen = HashSet::new();
        for field in self.persisted_fields() {
            if !seen.insert(field.column.to_ascii_lowercase()) {
                return Err(DescriptorError::invalid(
                    table,
                    format!("duplicate column '{}'", field.column),
                ));
            }
        }

        for index in &self.indexes {
            if index.columns.is_empty() {
                return Err(DescriptorError::invalid(
                    table,
                    format!("index '{}' has no columns", index.name),
                ));
            }
            if let Some(missing) = index
                .columns
                .iter()
                .find(|c| self.field_by_column(c).is_none())
            {
                return Err(DescriptorError::invalid(
                    table,
                    format!("index '{}' references unknown column '{}'", index.name, missing),
                ));
            }
        }

        for fk in &self.foreign_keys {
            if self.field_by_column(&fk.column).is_none() {
                return Err(DescriptorError::invalid(
                    table,
                    format!("relation '{}' references unknown column '{}'", fk.name, fk.column),
                ));
            }
        }

        Ok(())
    }
}

/// Anything that can describe its table.
///
/// Each entity exposes a pure builder; no runtime type inspection is involved.
pub trait EntityModel: Send + Sync {
    /// Builds the table descriptor.
    ///
    /// # Errors
    ///
    /// Returns a [`DescriptorError`] if the entity metadata is malformed.
    fn describe(&self) -> Result<TableDescriptor, DescriptorError>;
}

impl EntityModel for TableDescriptor {
    fn describe(&self) -> Result<TableDescriptor, DescriptorError> {
        self.validate()?;
        Ok(self.clone())
    }
}

impl<F> EntityModel for F
where
    F: Fn() -> TableDescriptor + Send + Sync,
{
    fn describe(&self) -> Result<TableDescriptor, DescriptorError> {
        let table = self();
        table.validate()?;
        Ok(table)
    }
}

/// Registry of the entity models a host application migrates.
#[derive(Default)]
pub struct ModelRegistry {
    models: Vec<Box<dyn EntityModel>>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model.
    #[must_use]
    pub fn with(mut self, model: impl EntityModel + 'static) -> Self {
        self.register(model);
        self
    }

    /// Registers a model.
    pub fn register(&mut self, model: impl EntityModel + 'static) {
        self.models.push(Box::new(model));
    }

    /// Builds a registry from declarative definitions.
    #[must_use]
    pub fn from_definitions(definitions: Vec<EntityDefinition>) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition);
        }
        registry
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns true if no model is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Builds every descriptor in registration order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first [`DescriptorError`] raised by a model.
    pub fn describe_all(&self) -> Result<Vec<TableDescriptor>, DescriptorError> {
        self.models.iter().map(|m| m.describe()).collect()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.models.len())
            .finish()
    }
}

// ================================================================
// Declarative definitions
// ================================================================

fn default_true() -> bool {
    true
}

fn default_target_column() -> String {
    "id".to_string()
}

/// Accepts string, number and boolean literals for `default`.
fn deserialize_literal<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(D::Error::custom(format!(
            "default must be a string, number or boolean, found {other}"
        ))),
    }
}

/// A field entry of an [`EntityDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    /// Logical field name.
    pub name: String,
    /// Column name; defaults to `name`, `"-"` or `""` excludes the field.
    #[serde(default)]
    pub column: Option<String>,
    /// Native type.
    #[serde(rename = "type")]
    pub native_type: NativeType,
    /// Size hint.
    #[serde(default)]
    pub size: u32,
    /// Whether the column allows NULL.
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// UNIQUE constraint.
    #[serde(default)]
    pub unique: bool,
    /// Primary key membership.
    #[serde(default)]
    pub primary_key: bool,
    /// Sequence-backed column.
    #[serde(default)]
    pub autoincrement: bool,
    /// Default literal.
    #[serde(default, deserialize_with = "deserialize_literal")]
    pub default: Option<String>,
    /// Inline check expression.
    #[serde(default)]
    pub check: Option<String>,
    /// Explicit SQL type.
    #[serde(default)]
    pub sql_type: Option<String>,
}

/// An index entry of an [`EntityDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexDefinition {
    /// Index name; defaults to `idx_<entity>_<columns>`.
    #[serde(default)]
    pub name: Option<String>,
    /// Member columns.
    pub columns: Vec<String>,
    /// Unique index.
    #[serde(default)]
    pub unique: bool,
}

/// A belongs-to relation of an [`EntityDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BelongsToDefinition {
    /// Referencing column.
    pub field: String,
    /// Referenced table.
    pub references: String,
    /// Referenced column.
    #[serde(default = "default_target_column")]
    pub target_column: String,
    /// ON DELETE action, RESTRICT when absent.
    #[serde(default)]
    pub on_delete: Option<ReferentialAction>,
    /// ON UPDATE action, RESTRICT when absent.
    #[serde(default)]
    pub on_update: Option<ReferentialAction>,
}

/// Declarative entity definition, as found in model files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDefinition {
    /// Entity name.
    pub entity: String,
    /// Table name, possibly schema-qualified; defaults to `entity`.
    #[serde(default)]
    pub table: Option<String>,
    /// Fields.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    /// Belongs-to relations.
    #[serde(default)]
    pub belongs_to: Vec<BelongsToDefinition>,
    /// Table-level check constraints.
    #[serde(default)]
    pub checks: Vec<CheckConstraint>,
}

impl EntityDefinition {
    /// Interprets a JSON value as an entity definition.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Parse`] if the value is not an object or
    /// does not match the definition layout.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DescriptorError> {
        let entity = value
            .get("entity")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();

        if !value.is_object() {
            return Err(DescriptorError::Parse {
                entity,
                message: format!("expected a structured record, found {value}"),
            });
        }

        serde_json::from_value(value).map_err(|e| DescriptorError::Parse {
            entity,
            message: e.to_string(),
        })
    }

    /// Parses a JSON document holding one entity definition.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Parse`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, DescriptorError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| DescriptorError::Parse {
                entity: "<unknown>".to_string(),
                message: e.to_string(),
            })?;
        Self::from_value(value)
    }

    fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.entity)
    }
}

impl EntityModel for EntityDefinition {
    fn describe(&self) -> Result<TableDescriptor, DescriptorError> {
        if self.entity.trim().is_empty() {
            return Err(DescriptorError::Parse {
                entity: "<unknown>".to_string(),
                message: "entity name is empty".to_string(),
            });
        }

        let mut table = TableDescriptor::new(&self.entity, self.table_name());

        for def in &self.fields {
            let column = match def.column.as_deref() {
                Some("-") | Some("") => String::new(),
                Some(column) => column.to_string(),
                None => def.name.clone(),
            };
            table.fields.push(FieldDescriptor {
                name: def.name.clone(),
                column,
                native_type: def.native_type.clone(),
                size: def.size,
                nullable: def.nullable,
                unique: def.unique,
                primary_key: def.primary_key,
                autoincrement: def.autoincrement,
                default: def.default.clone(),
                check: def.check.clone(),
                sql_type: def.sql_type.clone(),
            });
        }

        for def in &self.indexes {
            let name = def
                .name
                .clone()
                .unwrap_or_else(|| format!("idx_{}_{}", self.entity, def.columns.join("_")));
            table.indexes.push(IndexDescriptor {
                name,
                columns: def.columns.clone(),
                unique: def.unique,
            });
        }

        for rel in &self.belongs_to {
            let fk = ForeignKeyDescriptor::belongs_to(
                &self.entity,
                &rel.field,
                &rel.references,
                &rel.target_column,
            )
            .on_delete(rel.on_delete.unwrap_or_default())
            .on_update(rel.on_update.unwrap_or_default());
            table.foreign_keys.push(fk);
        }

        table.checks = self.checks.clone();
        table.validate()?;
        Ok(table)
    }
}

/// Parses a model file: a JSON array of definitions, or an object with a
/// `models` array.
///
/// # Errors
///
/// Returns [`DescriptorError::Parse`] for malformed documents or entries.
pub fn load_definitions(json: &str) -> Result<Vec<EntityDefinition>, DescriptorError> {
    let parse_error = |message: String| DescriptorError::Parse {
        entity: "<unknown>".to_string(),
        message,
    };

    let document: serde_json::Value =
        serde_json::from_str(json).map_err(|e| parse_error(e.to_string()))?;

    let entries = match document {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(mut map) => match map.remove("models") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => return Err(parse_error("expected a 'models' array".to_string())),
        },
        other => {
            return Err(parse_error(format!(
                "expected an array of entity definitions, found {other}"
            )));
        }
    };

    entries.into_iter().map(EntityDefinition::from_value).collect()
}
