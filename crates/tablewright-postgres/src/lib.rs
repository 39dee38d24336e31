//! PostgreSQL introspection for tablewright.
//!
//! [`PgIntrospector`] answers the [`Introspector`] queries from
//! `information_schema` and the `pg_catalog` index tables. Unqualified table
//! names resolve against `current_schema()`.
//!
//! # Example
//!
//! ```rust,ignore
//! use tablewright_core::prelude::*;
//! use tablewright_postgres::PgIntrospector;
//!
//! let introspector = PgIntrospector::connect("postgres://localhost/app").await?;
//! let report = Migrator::new(MigratorConfig::default())
//!     .generate_alter(&models, "002_add_age", &introspector)
//!     .await?;
//! ```

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use tablewright_core::descriptor::TableName;
use tablewright_core::error::IntrospectError;
use tablewright_core::introspect::{ColumnSnapshot, IndexSnapshot, Introspector};

const HAS_TABLE: &str = "SELECT EXISTS (\
     SELECT 1 FROM information_schema.tables \
     WHERE table_schema = COALESCE($1, current_schema()) AND table_name = $2)";

const HAS_COLUMN: &str = "SELECT EXISTS (\
     SELECT 1 FROM information_schema.columns \
     WHERE table_schema = COALESCE($1, current_schema()) AND table_name = $2 \
     AND lower(column_name) = lower($3))";

const COLUMN_TYPES: &str = "SELECT column_name::text, udt_name::text, \
     character_maximum_length::int4, is_nullable::text, column_default::text \
     FROM information_schema.columns \
     WHERE table_schema = COALESCE($1, current_schema()) AND table_name = $2 \
     ORDER BY ordinal_position";

const GET_INDEXES: &str = "SELECT i.relname::text, ix.indisunique \
     FROM pg_index ix \
     JOIN pg_class t ON t.oid = ix.indrelid \
     JOIN pg_class i ON i.oid = ix.indexrelid \
     JOIN pg_namespace n ON n.oid = t.relnamespace \
     WHERE n.nspname = COALESCE($1, current_schema()) AND t.relname = $2 \
     AND NOT ix.indisprimary \
     ORDER BY i.relname";

/// Maps a driver error to an introspection error for the named query.
fn query_error(query: &'static str) -> impl FnOnce(sqlx::Error) -> IntrospectError {
    move |error| match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            IntrospectError::Unavailable(error.to_string())
        }
        other => IntrospectError::Query {
            query,
            message: other.to_string(),
        },
    }
}

/// `information_schema` reports nullability as `YES`/`NO`.
fn parse_nullable(is_nullable: Option<&str>) -> Option<bool> {
    match is_nullable? {
        s if s.eq_ignore_ascii_case("YES") => Some(true),
        s if s.eq_ignore_ascii_case("NO") => Some(false),
        _ => None,
    }
}

fn parse_length(length: Option<i32>) -> Option<u32> {
    length.and_then(|l| u32::try_from(l).ok())
}

type ColumnRow = (String, String, Option<i32>, Option<String>, Option<String>);

fn column_snapshot((name, type_name, length, is_nullable, default): ColumnRow) -> ColumnSnapshot {
    ColumnSnapshot {
        name,
        type_name,
        length: parse_length(length),
        nullable: parse_nullable(is_nullable.as_deref()),
        default,
    }
}

/// Introspector backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgIntrospector {
    pool: PgPool,
}

impl PgIntrospector {
    /// Creates an introspector over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a single-connection pool to `url`.
    pub async fn connect(url: &str) -> Result<Self, IntrospectError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| IntrospectError::Unavailable(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Introspector for PgIntrospector {
    async fn has_table(&self, table: &TableName) -> Result<bool, IntrospectError> {
        debug!(table = %table, "Checking table existence");
        let (exists,): (bool,) = sqlx::query_as(HAS_TABLE)
            .bind(table.schema.as_deref())
            .bind(&table.entity)
            .fetch_one(&self.pool)
            .await
            .map_err(query_error("has_table"))?;
        Ok(exists)
    }

    async fn has_column(&self, table: &TableName, column: &str) -> Result<bool, IntrospectError> {
        let (exists,): (bool,) = sqlx::query_as(HAS_COLUMN)
            .bind(table.schema.as_deref())
            .bind(&table.entity)
            .bind(column)
            .fetch_one(&self.pool)
            .await
            .map_err(query_error("has_column"))?;
        Ok(exists)
    }

    async fn column_types(&self, table: &TableName) -> Result<Vec<ColumnSnapshot>, IntrospectError> {
        let rows: Vec<ColumnRow> = sqlx::query_as(COLUMN_TYPES)
            .bind(table.schema.as_deref())
            .bind(&table.entity)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("column_types"))?;
        debug!(table = %table, columns = rows.len(), "Read column types");
        Ok(rows.into_iter().map(column_snapshot).collect())
    }

    async fn get_indexes(&self, table: &TableName) -> Result<Vec<IndexSnapshot>, IntrospectError> {
        let rows: Vec<(String, bool)> = sqlx::query_as(GET_INDEXES)
            .bind(table.schema.as_deref())
            .bind(&table.entity)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("get_indexes"))?;
        Ok(rows
            .into_iter()
            .map(|(name, unique)| IndexSnapshot { name, unique })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablewright_core::prelude::*;

    #[test]
    fn test_parse_nullable() {
        assert_eq!(parse_nullable(Some("YES")), Some(true));
        assert_eq!(parse_nullable(Some("NO")), Some(false));
        assert_eq!(parse_nullable(Some("maybe")), None);
        assert_eq!(parse_nullable(None), None);
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length(Some(255)), Some(255));
        assert_eq!(parse_length(Some(-1)), None);
        assert_eq!(parse_length(None), None);
    }

    #[test]
    fn test_column_snapshot_from_row() {
        let row = (
            "status".to_string(),
            "varchar".to_string(),
            Some(32),
            Some("NO".to_string()),
            Some("'new'::character varying".to_string()),
        );
        let snapshot = column_snapshot(row);
        assert_eq!(snapshot.length, Some(32));
        assert_eq!(snapshot.nullable, Some(false));
        assert_eq!(snapshot.default.as_deref(), Some("'new'::character varying"));
    }

    #[test]
    fn test_error_mapping() {
        let err = query_error("has_table")(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, IntrospectError::Unavailable(_)));

        let err = query_error("get_indexes")(sqlx::Error::RowNotFound);
        assert!(matches!(err, IntrospectError::Query { query: "get_indexes", .. }));
    }

    async fn live() -> Option<PgIntrospector> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        Some(PgIntrospector::connect(&url).await.unwrap())
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn test_live_introspection() {
        let Some(db) = live().await else { return };
        sqlx::query("DROP TABLE IF EXISTS \"TwScratch\"")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE \"TwScratch\" (id SERIAL, name VARCHAR(40) NOT NULL DEFAULT 'x', \
             note TEXT, PRIMARY KEY (id))",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query("CREATE UNIQUE INDEX idx_twscratch_name ON \"TwScratch\" (name)")
            .execute(db.pool())
            .await
            .unwrap();

        let name = TableName::parse("TwScratch");
        assert!(db.has_table(&name).await.unwrap());
        assert!(db.has_column(&name, "NAME").await.unwrap());
        assert!(!db.has_column(&name, "missing").await.unwrap());

        let columns = db.column_types(&name).await.unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].type_name, "int4");
        assert_eq!(columns[1].length, Some(40));
        assert_eq!(columns[1].nullable, Some(false));
        assert_eq!(columns[2].nullable, Some(true));

        let indexes = db.get_indexes(&name).await.unwrap();
        assert_eq!(indexes, vec![IndexSnapshot::new("idx_twscratch_name", true)]);

        sqlx::query("DROP TABLE \"TwScratch\"")
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn test_live_roundtrip_is_idempotent() {
        let Some(db) = live().await else { return };
        let table = TableDescriptor::new("TwRoundtrip", "TwRoundtrip")
            .field(FieldDescriptor::new("id", NativeType::Int64).primary_key().autoincrement())
            .field(FieldDescriptor::new("email", NativeType::String).size(120).not_null())
            .field(FieldDescriptor::new("plan", NativeType::String).default_value("free"))
            .field(FieldDescriptor::new("credits", NativeType::Int).default_value("-1"))
            .index(IndexDescriptor::new("idx_twroundtrip_email", &["email"]).unique());

        sqlx::query("DROP TABLE IF EXISTS \"TwRoundtrip\"")
            .execute(db.pool())
            .await
            .unwrap();

        let first = Differ::new(&db).diff_table(&table).await.unwrap();
        for change in &first.changes {
            sqlx::query(&change.sql).execute(db.pool()).await.unwrap();
        }

        let second = Differ::new(&db).diff_table(&table).await.unwrap();
        assert!(second.is_clean(), "{:#?}", second.changes);

        sqlx::query("DROP TABLE \"TwRoundtrip\"")
            .execute(db.pool())
            .await
            .unwrap();
    }
}
