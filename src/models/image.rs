use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{create_table, owned_columns, register_model};
use crate::error::Result;
use crate::orm::{Db, Model};

pub const RECENT_LIMIT: i64 = 20;

pub const IMAGE_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY"),
    ("url", "TEXT NOT NULL"),
    ("created_at", "TEXT NOT NULL"),
];

/// A gallery image uploaded by an admin.
#[derive(Clone, Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentImage {
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Model for RecentImage {
    fn table_name() -> &'static str {
        "recent_images"
    }

    fn create_table_sql() -> String {
        create_table(Self::table_name(), IMAGE_COLUMNS)
    }

    fn columns() -> Vec<(String, String)> {
        owned_columns(IMAGE_COLUMNS)
    }
}

register_model!(RecentImage);

impl RecentImage {
    pub async fn insert(&self, db: &Db) -> Result<()> {
        sqlx::query("INSERT INTO recent_images (id, url, created_at) VALUES (?1, ?2, ?3)")
            .bind(&self.id)
            .bind(&self.url)
            .bind(self.created_at)
            .execute(db.pool())
            .await?;
        Ok(())
    }

    pub async fn recent(db: &Db) -> Result<Vec<RecentImage>> {
        Ok(sqlx::query_as(
            "SELECT * FROM recent_images ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )
        .bind(RECENT_LIMIT)
        .fetch_all(db.pool())
        .await?)
    }
}
