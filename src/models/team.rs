use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{create_table, owned_columns, register_model};
use crate::error::Result;
use crate::orm::{Db, Model};

pub const TEAM_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY"),
    ("name", "TEXT NOT NULL"),
    ("designation", "TEXT NOT NULL"),
    ("image", "TEXT NOT NULL"),
    ("created_at", "TEXT NOT NULL"),
];

#[derive(Clone, Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub designation: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Model for TeamMember {
    fn table_name() -> &'static str {
        "team_members"
    }

    fn create_table_sql() -> String {
        create_table(Self::table_name(), TEAM_COLUMNS)
    }

    fn columns() -> Vec<(String, String)> {
        owned_columns(TEAM_COLUMNS)
    }
}

register_model!(TeamMember);

impl TeamMember {
    pub async fn insert(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "INSERT INTO team_members (id, name, designation, image, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&self.id)
        .bind(&self.name)
        .bind(&self.designation)
        .bind(&self.image)
        .bind(self.created_at)
        .execute(db.pool())
        .await?;
        Ok(())
    }

    pub async fn list(db: &Db) -> Result<Vec<TeamMember>> {
        Ok(sqlx::query_as("SELECT * FROM team_members ORDER BY created_at, rowid")
            .fetch_all(db.pool())
            .await?)
    }
}
