//! Persisted records. Every model registers its table migration with
//! `inventory` so [`crate::orm::auto_migrate`] picks it up.
use chrono::{DateTime, Utc};

/// Register a model's table migration.
macro_rules! register_model {
    ($model:ty) => {
        inventory::submit! {
            $crate::orm::Migration {
                table: <$model as $crate::orm::Model>::table_name,
                run: |db| <$model as $crate::orm::Model>::migrate(db),
            }
        }
    };
}
pub(crate) use register_model;

pub mod activity;
pub mod admin;
pub mod branch;
pub mod course;
pub mod image;
pub mod lead;
pub mod student;
pub mod team;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// `CREATE TABLE` statement for a column list.
pub fn create_table(table: &str, columns: &[(&str, &str)]) -> String {
    let cols: Vec<String> = columns
        .iter()
        .map(|(name, def)| format!("{} {}", name, def))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        table,
        cols.join(",\n    ")
    )
}

pub fn owned_columns(columns: &[(&str, &str)]) -> Vec<(String, String)> {
    columns
        .iter()
        .map(|(n, t)| (n.to_string(), t.to_string()))
        .collect()
}

/// Which unique column a constraint violation hit, if any.
pub fn violated_unique(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            // sqlite: "UNIQUE constraint failed: students.mobile"
            let msg = db_err.message();
            Some(
                msg.rsplit('.')
                    .next()
                    .unwrap_or(msg)
                    .trim()
                    .to_string(),
            )
        }
        _ => None,
    }
}
