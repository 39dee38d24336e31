//! Descriptor-driven PostgreSQL schema diffing.
//!
//! `tablewright-core` compares what entity models declare against what a
//! live database reports and writes the difference as a plain SQL migration
//! script. It never executes the script.
//!
//! # Architecture
//!
//! - **Descriptor** - Entity models and declarative definitions become
//!   [`TableDescriptor`](descriptor::TableDescriptor) values
//! - **Render** - Pure DDL rendering and the native-to-SQL type mapping
//! - **Types** - Type equivalence classes used when comparing columns
//! - **Introspect** - The read-only database boundary
//! - **Diff** - Absent/present table comparison producing typed changes
//! - **Writer** - Fixed statement ordering and script serialization
//! - **Migrator** - The initial and alter generation runs
//!
//! # Example
//!
//! ```rust,ignore
//! use tablewright_core::prelude::*;
//!
//! fn widget() -> TableDescriptor {
//!     TableDescriptor::new("Widget", "public.Widgets")
//!         .field(FieldDescriptor::new("id", NativeType::Int).primary_key().autoincrement())
//!         .field(FieldDescriptor::new("name", NativeType::String).not_null())
//! }
//!
//! let models = ModelRegistry::new().with(widget);
//! let migrator = Migrator::new(MigratorConfig::default());
//!
//! // migrations/001_initial.sql
//! migrator.generate_initial(&models)?;
//!
//! // migrations/002_widgets.sql, only if the database differs
//! migrator.generate_alter(&models, "002_widgets", &introspector).await?;
//! ```

pub mod change;
pub mod descriptor;
pub mod diff;
pub mod error;
pub mod introspect;
pub mod migrator;
pub mod render;
pub mod types;
pub mod writer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::change::{ChangeKind, SchemaChange};
    pub use crate::descriptor::{
        load_definitions, EntityDefinition, EntityModel, FieldDescriptor, ForeignKeyDescriptor,
        IndexDescriptor, ModelRegistry, NativeType, ReferentialAction, TableDescriptor, TableName,
    };
    pub use crate::diff::{Degradation, DiffOutcome, Differ, IntrospectionPolicy};
    pub use crate::error::{DescriptorError, GenerateError, IntrospectError, Result};
    pub use crate::introspect::{
        ColumnSnapshot, IndexSnapshot, IntrospectionAspect, Introspector, MemoryIntrospector,
    };
    pub use crate::migrator::{GenerateReport, Migrator, MigratorConfig};
    pub use crate::writer::{
        generate_migration_name, validate_migration_name, MigrationWriter, INITIAL_MIGRATION_NAME,
    };
}
