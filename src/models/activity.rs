use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{create_table, owned_columns, register_model};
use crate::error::Result;
use crate::orm::{Db, Model};

pub const ACTIVITY_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY"),
    ("title", "TEXT NOT NULL"),
    ("description", "TEXT NOT NULL"),
    ("date", "TEXT"),
    ("created_at", "TEXT NOT NULL"),
];

/// An institute event shown on the public site.
#[derive(Clone, Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Model for Activity {
    fn table_name() -> &'static str {
        "activities"
    }

    fn create_table_sql() -> String {
        create_table(Self::table_name(), ACTIVITY_COLUMNS)
    }

    fn columns() -> Vec<(String, String)> {
        owned_columns(ACTIVITY_COLUMNS)
    }
}

register_model!(Activity);

impl Activity {
    pub async fn insert(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "INSERT INTO activities (id, title, description, date, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&self.id)
        .bind(&self.title)
        .bind(&self.description)
        .bind(&self.date)
        .bind(self.created_at)
        .execute(db.pool())
        .await?;
        Ok(())
    }

    /// Newest first.
    pub async fn list(db: &Db) -> Result<Vec<Activity>> {
        Ok(
            sqlx::query_as("SELECT * FROM activities ORDER BY created_at DESC, rowid DESC")
                .fetch_all(db.pool())
                .await?,
        )
    }
}
