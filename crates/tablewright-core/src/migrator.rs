//! Generation entry points.
//!
//! [`Migrator`] wires descriptors, introspection, diffing and the writer
//! together for the two supported runs: an initial script built purely from
//! descriptors, and an alter script built by comparing against a live
//! database.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::change::SchemaChange;
use crate::descriptor::ModelRegistry;
use crate::diff::{create_changes, Degradation, DiffOutcome, Differ, IntrospectionPolicy};
use crate::error::Result;
use crate::introspect::Introspector;
use crate::writer::{validate_migration_name, MigrationWriter, INITIAL_MIGRATION_NAME};

/// Migrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratorConfig {
    /// Directory migration scripts are written to.
    pub migrations_dir: PathBuf,
    /// What to do when introspection fails.
    pub policy: IntrospectionPolicy,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            policy: IntrospectionPolicy::Degrade,
        }
    }
}

/// Result of a generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    /// Written script, `None` when there was nothing to write.
    pub path: Option<PathBuf>,
    /// Number of statements in the script.
    pub change_count: usize,
    /// Introspection failures tolerated during the run.
    pub degradations: Vec<Degradation>,
}

/// Generates migration scripts from entity models.
#[derive(Debug, Clone)]
pub struct Migrator {
    config: MigratorConfig,
    writer: MigrationWriter,
}

impl Migrator {
    /// Creates a migrator.
    #[must_use]
    pub fn new(config: MigratorConfig) -> Self {
        let writer = MigrationWriter::new(config.migrations_dir.clone());
        Self { config, writer }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Returns the creation sequence for every model, without a database.
    pub fn plan_initial(&self, models: &ModelRegistry) -> Result<Vec<SchemaChange>> {
        let tables = models.describe_all()?;
        Ok(tables.iter().flat_map(create_changes).collect())
    }

    /// Writes `001_initial.sql` creating every model's table, indexes and
    /// foreign keys. The file is written even when there are no models.
    pub fn generate_initial(&self, models: &ModelRegistry) -> Result<GenerateReport> {
        info!(models = models.len(), "Generating initial migration");
        let changes = self.plan_initial(models)?;
        let path = self.writer.write_always(INITIAL_MIGRATION_NAME, &changes)?;

        Ok(GenerateReport {
            path: Some(path),
            change_count: changes.len(),
            degradations: Vec::new(),
        })
    }

    /// Diffs every model against the database without writing anything.
    pub async fn plan_alter<I: Introspector>(
        &self,
        models: &ModelRegistry,
        introspector: &I,
    ) -> Result<DiffOutcome> {
        let tables = models.describe_all()?;
        let outcome = Differ::new(introspector)
            .with_policy(self.config.policy)
            .diff_all(&tables)
            .await?;

        if !outcome.degradations.is_empty() {
            warn!(
                count = outcome.degradations.len(),
                "Introspection was incomplete; the plan may miss changes"
            );
        }
        Ok(outcome)
    }

    /// Diffs every model against the database and writes `<name>.sql` with
    /// all changes. Nothing is written when the database already matches.
    pub async fn generate_alter<I: Introspector>(
        &self,
        models: &ModelRegistry,
        name: &str,
        introspector: &I,
    ) -> Result<GenerateReport> {
        validate_migration_name(name)?;
        info!(migration = name, models = models.len(), "Generating alter migration");

        let outcome = self.plan_alter(models, introspector).await?;
        let path = self.writer.write(name, &outcome.changes)?;

        Ok(GenerateReport {
            path,
            change_count: outcome.changes.len(),
            degradations: outcome.degradations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDescriptor, NativeType, TableDescriptor};
    use crate::error::GenerateError;
    use crate::introspect::{ColumnSnapshot, IntrospectionAspect, MemoryIntrospector};
    use tempfile::TempDir;

    fn widget() -> TableDescriptor {
        TableDescriptor::new("Widget", "public.Widgets")
            .field(FieldDescriptor::new("id", NativeType::Int).primary_key().autoincrement())
            .field(FieldDescriptor::new("name", NativeType::String).not_null())
    }

    fn migrator(dir: &TempDir, policy: IntrospectionPolicy) -> Migrator {
        Migrator::new(MigratorConfig {
            migrations_dir: dir.path().to_path_buf(),
            policy,
        })
    }

    #[test]
    fn test_default_config() {
        let config = MigratorConfig::default();
        assert_eq!(config.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(config.policy, IntrospectionPolicy::Degrade);
    }

    #[test]
    fn test_generate_initial_always_writes() {
        let dir = TempDir::new().unwrap();
        let report = migrator(&dir, IntrospectionPolicy::Degrade)
            .generate_initial(&ModelRegistry::new())
            .unwrap();

        assert_eq!(report.change_count, 0);
        assert_eq!(report.path, Some(dir.path().join("001_initial.sql")));
    }

    #[test]
    fn test_generate_initial_invalid_model() {
        let dir = TempDir::new().unwrap();
        let broken = TableDescriptor::new("Broken", "Broken")
            .field(FieldDescriptor::new("a", NativeType::Int))
            .field(FieldDescriptor::new("a", NativeType::Int));
        let models = ModelRegistry::new().with(broken);

        let result = migrator(&dir, IntrospectionPolicy::Degrade).generate_initial(&models);
        assert!(matches!(result, Err(GenerateError::Descriptor(_))));
        assert!(!dir.path().join("001_initial.sql").exists());
    }

    #[tokio::test]
    async fn test_generate_alter_noop_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut db = MemoryIntrospector::new();
        db.apply_descriptor(&widget());

        let report = migrator(&dir, IntrospectionPolicy::Degrade)
            .generate_alter(&ModelRegistry::new().with(widget), "002_noop", &db)
            .await
            .unwrap();

        assert_eq!(report, GenerateReport::default());
        assert!(!dir.path().join("002_noop.sql").exists());
    }

    #[tokio::test]
    async fn test_generate_alter_rejects_bad_name() {
        let dir = TempDir::new().unwrap();
        let db = MemoryIntrospector::new();

        let result = migrator(&dir, IntrospectionPolicy::Degrade)
            .generate_alter(&ModelRegistry::new().with(widget), "../x", &db)
            .await;
        assert!(matches!(result, Err(GenerateError::InvalidMigrationName(_))));
    }

    #[tokio::test]
    async fn test_generate_alter_reports_degradations() {
        let dir = TempDir::new().unwrap();
        let db = MemoryIntrospector::new()
            .table(
                "public.Widgets",
                vec![ColumnSnapshot::new("id", "int4").nullable(false)],
                vec![],
            )
            .failing(IntrospectionAspect::Indexes);

        let report = migrator(&dir, IntrospectionPolicy::Degrade)
            .generate_alter(&ModelRegistry::new().with(widget), "003_name", &db)
            .await
            .unwrap();

        assert_eq!(report.change_count, 1);
        assert_eq!(report.degradations.len(), 1);
        assert!(report.path.is_some());
    }

    #[tokio::test]
    async fn test_strict_run_fails_without_writing() {
        let dir = TempDir::new().unwrap();
        let db = MemoryIntrospector::new().failing(IntrospectionAspect::Table);

        let result = migrator(&dir, IntrospectionPolicy::FailFast)
            .generate_alter(&ModelRegistry::new().with(widget), "004_strict", &db)
            .await;
        assert!(matches!(result, Err(GenerateError::Introspection { .. })));
        assert!(!dir.path().join("004_strict.sql").exists());
    }
}
