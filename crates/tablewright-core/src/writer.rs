//! Migration script serialization.
//!
//! Changes are grouped by [`ChangeKind`] into a fixed statement order and
//! written as a single `.sql` file. The file is only ever generated; nothing
//! here executes it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::change::{ChangeKind, SchemaChange};
use crate::error::{GenerateError, Result};

/// Name of the migration written by an initial run.
pub const INITIAL_MIGRATION_NAME: &str = "001_initial";

/// Rejects names that cannot be used as a single file name.
pub fn validate_migration_name(name: &str) -> Result<()> {
    if name.trim().is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.contains('\0')
    {
        return Err(GenerateError::InvalidMigrationName(name.to_string()));
    }
    Ok(())
}

/// Builds a timestamped migration name, e.g. `20240115093000_add_age`.
///
/// The description is lowercased and anything other than ASCII letters and
/// digits becomes a single underscore.
#[must_use]
pub fn generate_migration_name(timestamp: DateTime<Utc>, description: &str) -> String {
    let mut slug = String::new();
    for ch in description.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    let slug = if slug.is_empty() { "auto" } else { slug };

    format!("{}_{}", timestamp.format("%Y%m%d%H%M%S"), slug)
}

/// Writes migration scripts into a directory.
#[derive(Debug, Clone)]
pub struct MigrationWriter {
    dir: PathBuf,
}

impl MigrationWriter {
    /// Creates a writer targeting `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path a migration with this name is written to.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.sql"))
    }

    /// Renders the script text.
    #[must_use]
    pub fn render(name: &str, generated_at: DateTime<Utc>, changes: &[SchemaChange]) -> String {
        let mut out = String::new();
        out.push_str(&format!("-- Migration: {name}\n"));
        out.push_str(&format!(
            "-- Generated at: {}\n\n",
            generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));

        out.push_str("-- ==================== UP Migration ====================\n\n");
        for kind in ChangeKind::ALL {
            let mut bucket = changes.iter().filter(|c| c.kind == kind).peekable();
            if bucket.peek().is_none() {
                continue;
            }
            out.push_str(&format!("-- {}\n", kind.label()));
            for change in bucket {
                out.push_str(&format!("{change}\n\n"));
            }
        }

        out.push_str("-- ==================== DOWN Migration (Rollback) ====================\n\n");
        out.push_str("-- Rollback statements are not generated; write them manually if needed.\n");
        out
    }

    /// Writes `<dir>/<name>.sql`.
    ///
    /// Returns `Ok(None)` without touching the filesystem when there are no
    /// changes.
    pub fn write(&self, name: &str, changes: &[SchemaChange]) -> Result<Option<PathBuf>> {
        if changes.is_empty() {
            info!(migration = name, "No schema changes, nothing written");
            return Ok(None);
        }
        self.write_always(name, changes).map(Some)
    }

    /// Writes `<dir>/<name>.sql` even when `changes` is empty.
    pub fn write_always(&self, name: &str, changes: &[SchemaChange]) -> Result<PathBuf> {
        validate_migration_name(name)?;

        fs::create_dir_all(&self.dir).map_err(|source| GenerateError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(name);
        let script = Self::render(name, Utc::now(), changes);
        fs::write(&path, script).map_err(|source| GenerateError::Io {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), changes = changes.len(), "Migration written");
        Ok(path)
    }
}
