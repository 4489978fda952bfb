use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use sqlx::types::Json;

use super::{create_table, owned_columns, register_model, violated_unique};
use crate::error::{AppError, Result};
use crate::orm::{Db, Model};

pub const COURSE_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY"),
    ("course_name", "TEXT NOT NULL UNIQUE"),
    ("duration", "TEXT NOT NULL"),
    ("content", "TEXT NOT NULL"),
    ("fees", "TEXT"),
    ("images", "TEXT NOT NULL DEFAULT '[]'"),
    ("created_at", "TEXT NOT NULL"),
];

#[derive(Clone, Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    pub course_name: String,
    pub duration: String,
    pub content: String,
    pub fees: Option<String>,
    pub images: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Model for Course {
    fn table_name() -> &'static str {
        "courses"
    }

    fn create_table_sql() -> String {
        create_table(Self::table_name(), COURSE_COLUMNS)
    }

    fn columns() -> Vec<(String, String)> {
        owned_columns(COURSE_COLUMNS)
    }
}

register_model!(Course);

impl Course {
    pub async fn insert(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "INSERT INTO courses (id, course_name, duration, content, fees, images, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&self.id)
        .bind(&self.course_name)
        .bind(&self.duration)
        .bind(&self.content)
        .bind(&self.fees)
        .bind(&self.images)
        .bind(self.created_at)
        .execute(db.pool())
        .await
        .map_err(|e| match violated_unique(&e) {
            Some(_) => AppError::validation("Course already exists"),
            None => AppError::Database(e),
        })?;
        Ok(())
    }

    pub async fn list(db: &Db) -> Result<Vec<Course>> {
        Ok(sqlx::query_as("SELECT * FROM courses ORDER BY course_name")
            .fetch_all(db.pool())
            .await?)
    }

    pub async fn delete(db: &Db, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = ?1")
            .bind(id)
            .execute(db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
