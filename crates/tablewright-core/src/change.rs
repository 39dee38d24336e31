//! Schema changes produced by the differ and consumed by the writer.

use std::fmt;

/// Kind of schema change.
///
/// Declaration order is the order statements appear in a migration script:
/// anything referencing a table or column follows its creation, and
/// destructive drops come last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    /// `CREATE TABLE`.
    CreateTable,
    /// `ALTER TABLE ... ADD COLUMN`.
    AddColumn,
    /// `ALTER TABLE ... ALTER COLUMN`.
    ModifyColumn,
    /// `CREATE INDEX`.
    AddIndex,
    /// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY`.
    AddForeignKey,
    /// `ALTER TABLE ... DROP COLUMN IF EXISTS`.
    DropColumn,
}

impl ChangeKind {
    /// Every kind, in script order.
    pub const ALL: [Self; 6] = [
        Self::CreateTable,
        Self::AddColumn,
        Self::ModifyColumn,
        Self::AddIndex,
        Self::AddForeignKey,
        Self::DropColumn,
    ];

    /// Human-readable label used in script section comments.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::CreateTable => "Create tables",
            Self::AddColumn => "Add columns",
            Self::ModifyColumn => "Modify columns",
            Self::AddIndex => "Add indexes",
            Self::AddForeignKey => "Add foreign keys",
            Self::DropColumn => "Drop columns",
        }
    }
}

/// One ready-to-execute DDL statement and what it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChange {
    /// Kind of change.
    pub kind: ChangeKind,
    /// Table the change applies to.
    pub table: String,
    /// Complete SQL statement, without trailing semicolon.
    pub sql: String,
}

impl SchemaChange {
    /// Creates a change.
    #[must_use]
    pub fn new(kind: ChangeKind, table: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            sql: sql.into(),
        }
    }
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};", self.sql)
    }
}
