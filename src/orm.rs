//! Thin async persistence layer over sqlite + sqlx.
//!
//! Models describe their table (`Model`) and register a [`Migration`] with
//! `inventory`; `auto_migrate` creates missing tables and adds missing
//! columns at startup. Schema state is tracked in `__certdesk_migrations`,
//! keyed by table name for model schemas and by file name for `*.sql` files.
//!
//! Data access goes through bound queries on [`Db::pool`].
pub use futures::future::BoxFuture;
use log::{debug, error, info};
use sha2::{Digest, Sha256};
pub use sqlx::FromRow;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use walkdir::WalkDir;

const META_TABLE: &str = "__certdesk_migrations";

const META_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS __certdesk_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT UNIQUE,
    table_name TEXT,
    schema_sql TEXT,
    hash TEXT,
    applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
)";

pub type MigrationFn = fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>;

/// A model's schema migration, collected with `inventory`.
pub struct Migration {
    pub table: fn() -> &'static str,
    pub run: MigrationFn,
}

/// Async SQLite pool wrapper.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// A persisted record type: knows its table and how to create/extend it.
#[async_trait::async_trait]
pub trait Model: Send + Sync {
    fn table_name() -> &'static str;
    fn create_table_sql() -> String;
    fn columns() -> Vec<(String, String)>;

    /// Create the table on first run; afterwards add any declared column
    /// that the live table lacks. Columns are never dropped or altered.
    async fn migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
        let table = Self::table_name();
        let create_sql = Self::create_table_sql();
        let schema_hash = hash(&create_sql);

        db.execute(META_TABLE_SQL).await?;

        match recorded_hash(&db, table).await? {
            None => {
                db.execute(&create_sql).await?;
                record_schema(&db, table, &create_sql, &schema_hash, true).await?;
                info!("Migrated `{}` (table created).", table);
            }
            Some(stored) if stored == schema_hash => {
                debug!("Schema of `{}` unchanged.", table);
            }
            Some(_) => {
                let existing = existing_columns(&db, table).await?;
                let missing: Vec<(String, String)> = Self::columns()
                    .into_iter()
                    .filter(|(name, _)| !existing.contains(name))
                    .collect();
                for (name, sqltype) in &missing {
                    db.execute(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, name, sqltype))
                        .await?;
                    info!("`{}`: added column {} {}", table, name, sqltype);
                }
                record_schema(&db, table, &create_sql, &schema_hash, false).await?;
            }
        }
        Ok(())
    }
}

fn hash(s: &str) -> String {
    format!("{:x}", Sha256::digest(s.as_bytes()))
}

async fn recorded_hash(db: &Db, table: &str) -> Result<Option<String>, sqlx::Error> {
    let sql = format!("SELECT hash FROM {} WHERE table_name = ?1", META_TABLE);
    let row = sqlx::query(&sql).bind(table).fetch_optional(db.pool()).await?;
    Ok(row.and_then(|r| r.get::<Option<String>, _>("hash")))
}

async fn record_schema(
    db: &Db,
    table: &str,
    schema_sql: &str,
    schema_hash: &str,
    first: bool,
) -> Result<(), sqlx::Error> {
    let sql = if first {
        format!(
            "INSERT INTO {} (schema_sql, hash, table_name) VALUES (?1, ?2, ?3)",
            META_TABLE
        )
    } else {
        format!(
            "UPDATE {} SET schema_sql = ?1, hash = ?2, applied_at = CURRENT_TIMESTAMP \
             WHERE table_name = ?3",
            META_TABLE
        )
    };
    sqlx::query(&sql)
        .bind(schema_sql)
        .bind(schema_hash)
        .bind(table)
        .execute(db.pool())
        .await?;
    Ok(())
}

async fn existing_columns(db: &Db, table: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(db.pool())
        .await?;
    Ok(rows
        .iter()
        .map(|row: &SqliteRow| row.get::<String, _>("name"))
        .collect())
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI.
    ///
    /// In-memory databases get a single pooled connection, otherwise every
    /// connection would see its own empty database.
    pub async fn connect(uri: &str) -> Result<Self, sqlx::Error> {
        info!("Connecting to SQLite database at {}", uri);
        let options = SqliteConnectOptions::from_str(uri)?
            .create_if_missing(true)
            .foreign_keys(true);
        let in_memory = uri.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 8 })
            .min_connections(if in_memory { 1 } else { 0 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Db { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run raw SQL (DDL, migration scripts). May contain several statements.
    pub async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        debug!("Executing SQL: {}", sql);
        self.pool.execute(sql).await.map(|_| ()).inspect_err(|e| {
            error!("SQL execution failed: {}", e);
        })
    }

    /// Fetch all rows of a parameterless query.
    pub async fn fetch_all<T>(&self, sql: &str) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        debug!("Fetching rows with SQL: {}", sql);
        let rows = sqlx::query_as(sql).fetch_all(&self.pool).await.inspect_err(|e| {
            error!("Row fetch failed: {}", e);
        })?;
        debug!("Fetched {} rows", rows.len());
        Ok(rows)
    }
}

/// Run every registered model migration.
pub async fn auto_migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
    let mut total = 0;
    for migration in inventory::iter::<Migration> {
        (migration.run)(db.clone()).await.inspect_err(|e| {
            error!("Migration of `{}` failed: {}", (migration.table)(), e);
        })?;
        total += 1;
    }
    info!("Auto migration completed for {} models.", total);
    Ok(())
}

/// Apply `*.sql` files from `migrations_dir` (non-recursive) in file name
/// order. Each file runs at most once per database. A missing directory is
/// treated as empty.
pub async fn apply_migration_files(db: Arc<Db>, migrations_dir: &str) -> Result<(), sqlx::Error> {
    db.execute(META_TABLE_SQL).await?;

    let files: Vec<_> = WalkDir::new(migrations_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
        .collect();

    let seen_sql = format!("SELECT 1 FROM {} WHERE filename = ?1", META_TABLE);
    let mark_sql = format!("INSERT INTO {} (filename) VALUES (?1)", META_TABLE);
    for entry in files {
        let filename = entry.file_name().to_string_lossy().into_owned();
        let seen = sqlx::query(&seen_sql)
            .bind(&filename)
            .fetch_optional(db.pool())
            .await?;
        if seen.is_some() {
            debug!("Migration `{}` already applied.", filename);
            continue;
        }

        let sql = tokio::fs::read_to_string(entry.path())
            .await
            .map_err(sqlx::Error::Io)?;
        db.execute(&sql).await?;
        sqlx::query(&mark_sql).bind(&filename).execute(db.pool()).await?;
        info!("Applied migration file `{}`.", filename);
    }
    Ok(())
}
