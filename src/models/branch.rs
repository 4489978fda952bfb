use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use sqlx::types::Json;

use super::{create_table, owned_columns, register_model, violated_unique};
use crate::error::{AppError, Result};
use crate::orm::{Db, Model};

pub const BRANCH_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY"),
    ("branch_name", "TEXT NOT NULL UNIQUE"),
    ("branch_code", "TEXT NOT NULL UNIQUE"),
    ("address", "TEXT NOT NULL DEFAULT ''"),
    ("images", "TEXT NOT NULL DEFAULT '[]'"),
    ("created_at", "TEXT NOT NULL"),
];

/// A physical institute location; its code is part of every registration number.
#[derive(Clone, Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    #[serde(rename = "_id")]
    pub id: String,
    pub branch_name: String,
    pub branch_code: String,
    pub address: String,
    pub images: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Model for Branch {
    fn table_name() -> &'static str {
        "branches"
    }

    fn create_table_sql() -> String {
        create_table(Self::table_name(), BRANCH_COLUMNS)
    }

    fn columns() -> Vec<(String, String)> {
        owned_columns(BRANCH_COLUMNS)
    }
}

register_model!(Branch);

impl Branch {
    pub async fn insert(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "INSERT INTO branches (id, branch_name, branch_code, address, images, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&self.id)
        .bind(&self.branch_name)
        .bind(&self.branch_code)
        .bind(&self.address)
        .bind(&self.images)
        .bind(self.created_at)
        .execute(db.pool())
        .await
        .map_err(|e| match violated_unique(&e).as_deref() {
            Some("branch_code") => AppError::validation("Branch code already exists"),
            Some(_) => AppError::validation("Branch already exists"),
            None => AppError::Database(e),
        })?;
        Ok(())
    }

    pub async fn list(db: &Db) -> Result<Vec<Branch>> {
        Ok(sqlx::query_as("SELECT * FROM branches ORDER BY branch_name")
            .fetch_all(db.pool())
            .await?)
    }

    pub async fn find_by_name(db: &Db, branch_name: &str) -> Result<Option<Branch>> {
        Ok(sqlx::query_as("SELECT * FROM branches WHERE branch_name = ?1")
            .bind(branch_name)
            .fetch_optional(db.pool())
            .await?)
    }

    pub async fn delete(db: &Db, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM branches WHERE id = ?1")
            .bind(id)
            .execute(db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
