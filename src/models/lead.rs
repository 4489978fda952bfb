//! Lead-capture records from the public site: course applications, course
//! inquiries and contact messages. Together they make up the admin
//! notification feed.
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{create_table, owned_columns, register_model, violated_unique};
use crate::error::{AppError, Result};
use crate::orm::{Db, Model};

/// Which lead collection a notification belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeadKind {
    /// `applyData`: application to a branch/course.
    Application,
    /// `applyCourse`: inquiry about one course.
    Inquiry,
    /// `sendMsg`: contact form message.
    Message,
}

impl LeadKind {
    pub fn table(self) -> &'static str {
        match self {
            LeadKind::Application => CourseApplication::table_name(),
            LeadKind::Inquiry => CourseInquiry::table_name(),
            LeadKind::Message => ContactMessage::table_name(),
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            LeadKind::Application => "applyData",
            LeadKind::Inquiry => "applyCourse",
            LeadKind::Message => "sendMsg",
        }
    }

    pub async fn count(self, db: &Db) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table()))
            .fetch_one(db.pool())
            .await?;
        Ok(row.0)
    }

    pub async fn delete(self, db: &Db, id: &str) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", self.table()))
            .bind(id)
            .execute(db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl FromStr for LeadKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "applyData" => Ok(LeadKind::Application),
            "applyCourse" => Ok(LeadKind::Inquiry),
            "sendMsg" => Ok(LeadKind::Message),
            _ => Err(AppError::validation("Invalid type")),
        }
    }
}

fn duplicate_phone(err: sqlx::Error, message: &str) -> AppError {
    if violated_unique(&err).is_some() {
        AppError::validation(message)
    } else {
        AppError::Database(err)
    }
}

pub const APPLICATION_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY"),
    ("name", "TEXT NOT NULL"),
    ("mobile", "TEXT NOT NULL UNIQUE"),
    ("email", "TEXT"),
    ("center", "TEXT NOT NULL"),
    ("course", "TEXT NOT NULL"),
    ("created_at", "TEXT NOT NULL"),
];

#[derive(Clone, Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseApplication {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub mobile: String,
    pub email: Option<String>,
    pub center: String,
    pub course: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Model for CourseApplication {
    fn table_name() -> &'static str {
        "course_applications"
    }

    fn create_table_sql() -> String {
        create_table(Self::table_name(), APPLICATION_COLUMNS)
    }

    fn columns() -> Vec<(String, String)> {
        owned_columns(APPLICATION_COLUMNS)
    }
}

register_model!(CourseApplication);

impl CourseApplication {
    pub async fn insert(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "INSERT INTO course_applications (id, name, mobile, email, center, course, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&self.id)
        .bind(&self.name)
        .bind(&self.mobile)
        .bind(&self.email)
        .bind(&self.center)
        .bind(&self.course)
        .bind(self.created_at)
        .execute(db.pool())
        .await
        .map_err(|e| duplicate_phone(e, "Already applied with this number"))?;
        Ok(())
    }

    pub async fn list(db: &Db) -> Result<Vec<CourseApplication>> {
        Ok(
            sqlx::query_as("SELECT * FROM course_applications ORDER BY created_at DESC, rowid DESC")
                .fetch_all(db.pool())
                .await?,
        )
    }
}

pub const INQUIRY_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY"),
    ("course_name", "TEXT NOT NULL"),
    ("name", "TEXT NOT NULL"),
    ("ph", "TEXT NOT NULL UNIQUE"),
    ("created_at", "TEXT NOT NULL"),
];

#[derive(Clone, Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInquiry {
    #[serde(rename = "_id")]
    pub id: String,
    pub course_name: String,
    pub name: String,
    pub ph: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Model for CourseInquiry {
    fn table_name() -> &'static str {
        "course_inquiries"
    }

    fn create_table_sql() -> String {
        create_table(Self::table_name(), INQUIRY_COLUMNS)
    }

    fn columns() -> Vec<(String, String)> {
        owned_columns(INQUIRY_COLUMNS)
    }
}

register_model!(CourseInquiry);

impl CourseInquiry {
    pub async fn insert(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "INSERT INTO course_inquiries (id, course_name, name, ph, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&self.id)
        .bind(&self.course_name)
        .bind(&self.name)
        .bind(&self.ph)
        .bind(self.created_at)
        .execute(db.pool())
        .await
        .map_err(|e| {
            duplicate_phone(
                e,
                "With this mobile no already applied. We will contact you soon",
            )
        })?;
        Ok(())
    }

    pub async fn list(db: &Db) -> Result<Vec<CourseInquiry>> {
        Ok(
            sqlx::query_as("SELECT * FROM course_inquiries ORDER BY created_at DESC, rowid DESC")
                .fetch_all(db.pool())
                .await?,
        )
    }
}

pub const MESSAGE_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY"),
    ("name", "TEXT NOT NULL"),
    ("ph", "TEXT NOT NULL UNIQUE"),
    ("email", "TEXT"),
    ("msg", "TEXT NOT NULL"),
    ("created_at", "TEXT NOT NULL"),
];

#[derive(Clone, Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub ph: String,
    pub email: Option<String>,
    pub msg: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Model for ContactMessage {
    fn table_name() -> &'static str {
        "contact_messages"
    }

    fn create_table_sql() -> String {
        create_table(Self::table_name(), MESSAGE_COLUMNS)
    }

    fn columns() -> Vec<(String, String)> {
        owned_columns(MESSAGE_COLUMNS)
    }
}

register_model!(ContactMessage);

impl ContactMessage {
    pub async fn insert(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "INSERT INTO contact_messages (id, name, ph, email, msg, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&self.id)
        .bind(&self.name)
        .bind(&self.ph)
        .bind(&self.email)
        .bind(&self.msg)
        .bind(self.created_at)
        .execute(db.pool())
        .await
        .map_err(|e| duplicate_phone(e, "Already applied with this phone no"))?;
        Ok(())
    }

    pub async fn list(db: &Db) -> Result<Vec<ContactMessage>> {
        Ok(
            sqlx::query_as("SELECT * FROM contact_messages ORDER BY created_at DESC, rowid DESC")
                .fetch_all(db.pool())
                .await?,
        )
    }
}
