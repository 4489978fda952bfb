use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{create_table, owned_columns, register_model, violated_unique};
use crate::error::{AppError, Result};
use crate::orm::{Db, Model};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub enum AdminRole {
    Super,
    BranchAdmin,
}

pub const ADMIN_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY"),
    ("name", "TEXT NOT NULL"),
    ("email", "TEXT NOT NULL UNIQUE"),
    ("mobile", "TEXT NOT NULL UNIQUE"),
    ("password_hash", "TEXT NOT NULL"),
    ("role", "TEXT NOT NULL"),
    ("branch_name", "TEXT"),
    ("branch_code", "TEXT"),
    ("is_verified", "BOOLEAN NOT NULL DEFAULT 0"),
    ("otp", "TEXT"),
    ("otp_expires_at", "TEXT"),
    ("reset_token_hash", "TEXT"),
    ("reset_expires_at", "TEXT"),
    ("created_at", "TEXT NOT NULL"),
    ("updated_at", "TEXT NOT NULL"),
];

/// The super admin or a branch admin.
#[derive(Clone, Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub mobile: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: AdminRole,
    pub branch_name: Option<String>,
    pub branch_code: Option<String>,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Model for Admin {
    fn table_name() -> &'static str {
        "admins"
    }

    fn create_table_sql() -> String {
        create_table(Self::table_name(), ADMIN_COLUMNS)
    }

    fn columns() -> Vec<(String, String)> {
        owned_columns(ADMIN_COLUMNS)
    }
}

register_model!(Admin);

fn map_write_error(err: sqlx::Error) -> AppError {
    match violated_unique(&err).as_deref() {
        Some("email") => AppError::validation("Admin with this email already exists"),
        Some("mobile") => AppError::validation("Admin with this mobile already exists"),
        Some(other) => AppError::validation(format!("Duplicate value for {}", other)),
        None => AppError::Database(err),
    }
}

impl Admin {
    /// A fresh, unverified admin without branch.
    pub fn new(
        name: String,
        email: String,
        mobile: String,
        password_hash: String,
        role: AdminRole,
    ) -> Admin {
        let now = super::now();
        Admin {
            id: super::new_id(),
            name,
            email,
            mobile,
            password_hash,
            role,
            branch_name: None,
            branch_code: None,
            is_verified: false,
            otp: None,
            otp_expires_at: None,
            reset_token_hash: None,
            reset_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn insert(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "INSERT INTO admins (id, name, email, mobile, password_hash, role, branch_name, branch_code, \
             is_verified, otp, otp_expires_at, reset_token_hash, reset_expires_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&self.id)
        .bind(&self.name)
        .bind(&self.email)
        .bind(&self.mobile)
        .bind(&self.password_hash)
        .bind(self.role)
        .bind(&self.branch_name)
        .bind(&self.branch_code)
        .bind(self.is_verified)
        .bind(&self.otp)
        .bind(self.otp_expires_at)
        .bind(&self.reset_token_hash)
        .bind(self.reset_expires_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(db.pool())
        .await
        .map_err(map_write_error)?;
        log::info!("Admin `{}` ({:?}) saved", self.email, self.role);
        Ok(())
    }

    pub async fn save(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "UPDATE admins SET name = ?2, email = ?3, mobile = ?4, password_hash = ?5, branch_name = ?6, \
             branch_code = ?7, is_verified = ?8, otp = ?9, otp_expires_at = ?10, reset_token_hash = ?11, \
             reset_expires_at = ?12, updated_at = ?13 WHERE id = ?1",
        )
        .bind(&self.id)
        .bind(&self.name)
        .bind(&self.email)
        .bind(&self.mobile)
        .bind(&self.password_hash)
        .bind(&self.branch_name)
        .bind(&self.branch_code)
        .bind(self.is_verified)
        .bind(&self.otp)
        .bind(self.otp_expires_at)
        .bind(&self.reset_token_hash)
        .bind(self.reset_expires_at)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    pub async fn find_by_id(db: &Db, id: &str) -> Result<Option<Admin>> {
        Ok(sqlx::query_as("SELECT * FROM admins WHERE id = ?1")
            .bind(id)
            .fetch_optional(db.pool())
            .await?)
    }

    pub async fn find_by_email(db: &Db, email: &str) -> Result<Option<Admin>> {
        Ok(sqlx::query_as("SELECT * FROM admins WHERE email = ?1")
            .bind(email)
            .fetch_optional(db.pool())
            .await?)
    }

    pub async fn find_by_mobile(db: &Db, mobile: &str) -> Result<Option<Admin>> {
        Ok(sqlx::query_as("SELECT * FROM admins WHERE mobile = ?1")
            .bind(mobile)
            .fetch_optional(db.pool())
            .await?)
    }

    pub async fn find_by_reset_hash(db: &Db, token_hash: &str) -> Result<Option<Admin>> {
        Ok(sqlx::query_as("SELECT * FROM admins WHERE reset_token_hash = ?1")
            .bind(token_hash)
            .fetch_optional(db.pool())
            .await?)
    }

    pub async fn super_exists(db: &Db) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins WHERE role = ?1")
            .bind(AdminRole::Super)
            .fetch_one(db.pool())
            .await?;
        Ok(row.0 > 0)
    }

    pub async fn list_branch_admins(db: &Db) -> Result<Vec<Admin>> {
        Ok(sqlx::query_as(
            "SELECT * FROM admins WHERE role = ?1 ORDER BY created_at DESC, rowid DESC",
        )
        .bind(AdminRole::BranchAdmin)
        .fetch_all(db.pool())
        .await?)
    }

    pub async fn delete(db: &Db, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM admins WHERE id = ?1")
            .bind(id)
            .execute(db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
