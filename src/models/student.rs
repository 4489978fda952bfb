use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{create_table, owned_columns, register_model, violated_unique};
use crate::error::{AppError, Result};
use crate::orm::{Db, Model};

pub const STUDENT_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY"),
    ("user_id", "TEXT NOT NULL UNIQUE"),
    ("name", "TEXT NOT NULL"),
    ("fathername", "TEXT NOT NULL"),
    ("mothername", "TEXT NOT NULL"),
    ("address", "TEXT NOT NULL"),
    ("dob", "TEXT NOT NULL"),
    ("dor", "TEXT NOT NULL"),
    ("gender", "TEXT NOT NULL"),
    ("mobile", "TEXT NOT NULL UNIQUE"),
    ("highest_qualification", "TEXT NOT NULL"),
    ("image", "TEXT NOT NULL DEFAULT ''"),
    ("password_hash", "TEXT"),
    ("role", "TEXT NOT NULL"),
    ("branch_name", "TEXT NOT NULL"),
    ("branch_code", "TEXT NOT NULL"),
    ("course_name", "TEXT NOT NULL"),
    ("course_duration", "TEXT NOT NULL"),
    ("course_content", "TEXT NOT NULL"),
    ("theory", "INTEGER"),
    ("practical", "INTEGER"),
    ("total_marks", "INTEGER"),
    ("grade", "TEXT"),
    ("typing_wpm", "INTEGER"),
    ("typing_marks", "INTEGER"),
    ("typing_grade", "TEXT"),
    ("active_status", "BOOLEAN NOT NULL DEFAULT 1"),
    ("certificate_downloaded", "BOOLEAN NOT NULL DEFAULT 0"),
    ("created_at", "TEXT NOT NULL"),
    ("updated_at", "TEXT NOT NULL"),
];

/// A registered student.
#[derive(Clone, Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub fathername: String,
    pub mothername: String,
    pub address: String,
    pub dob: String,
    pub dor: String,
    pub gender: String,
    pub mobile: String,
    pub highest_qualification: String,
    pub image: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: String,
    pub branch_name: String,
    pub branch_code: String,
    pub course_name: String,
    pub course_duration: String,
    pub course_content: String,
    pub theory: Option<i64>,
    pub practical: Option<i64>,
    #[serde(rename = "totalmarks")]
    pub total_marks: Option<i64>,
    pub grade: Option<String>,
    #[serde(rename = "typingWPM")]
    pub typing_wpm: Option<i64>,
    pub typing_marks: Option<i64>,
    pub typing_grade: Option<String>,
    pub active_status: bool,
    pub certificate_downloaded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields shown on the public verification page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPublic {
    pub user_id: String,
    pub name: String,
    pub fathername: String,
    pub mothername: String,
    pub address: String,
    pub dob: String,
    pub dor: String,
    pub gender: String,
    pub mobile: String,
    pub image: String,
    pub branch_name: String,
    pub course_name: String,
    pub course_duration: String,
    pub theory: Option<i64>,
    pub practical: Option<i64>,
    #[serde(rename = "totalmarks")]
    pub total_marks: Option<i64>,
    pub grade: Option<String>,
    #[serde(rename = "typingWPM")]
    pub typing_wpm: Option<i64>,
    pub typing_marks: Option<i64>,
    pub typing_grade: Option<String>,
}

impl From<&Student> for StudentPublic {
    fn from(s: &Student) -> Self {
        StudentPublic {
            user_id: s.user_id.clone(),
            name: s.name.clone(),
            fathername: s.fathername.clone(),
            mothername: s.mothername.clone(),
            address: s.address.clone(),
            dob: s.dob.clone(),
            dor: s.dor.clone(),
            gender: s.gender.clone(),
            mobile: s.mobile.clone(),
            image: s.image.clone(),
            branch_name: s.branch_name.clone(),
            course_name: s.course_name.clone(),
            course_duration: s.course_duration.clone(),
            theory: s.theory,
            practical: s.practical,
            total_marks: s.total_marks,
            grade: s.grade.clone(),
            typing_wpm: s.typing_wpm,
            typing_marks: s.typing_marks,
            typing_grade: s.typing_grade.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Model for Student {
    fn table_name() -> &'static str {
        "students"
    }

    fn create_table_sql() -> String {
        create_table(Self::table_name(), STUDENT_COLUMNS)
    }

    fn columns() -> Vec<(String, String)> {
        owned_columns(STUDENT_COLUMNS)
    }
}

register_model!(Student);

fn map_write_error(err: sqlx::Error) -> AppError {
    match violated_unique(&err).as_deref() {
        Some("mobile") => AppError::validation("User with this Phone number already exists"),
        Some("user_id") => AppError::validation("Registration number already exists"),
        Some(other) => AppError::validation(format!("Duplicate value for {}", other)),
        None => AppError::Database(err),
    }
}

impl Student {
    pub async fn insert(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "INSERT INTO students (id, user_id, name, fathername, mothername, address, dob, dor, gender, mobile, \
             highest_qualification, image, password_hash, role, branch_name, branch_code, course_name, \
             course_duration, course_content, theory, practical, total_marks, grade, typing_wpm, typing_marks, \
             typing_grade, active_status, certificate_downloaded, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, \
             ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30)",
        )
        .bind(&self.id)
        .bind(&self.user_id)
        .bind(&self.name)
        .bind(&self.fathername)
        .bind(&self.mothername)
        .bind(&self.address)
        .bind(&self.dob)
        .bind(&self.dor)
        .bind(&self.gender)
        .bind(&self.mobile)
        .bind(&self.highest_qualification)
        .bind(&self.image)
        .bind(&self.password_hash)
        .bind(&self.role)
        .bind(&self.branch_name)
        .bind(&self.branch_code)
        .bind(&self.course_name)
        .bind(&self.course_duration)
        .bind(&self.course_content)
        .bind(self.theory)
        .bind(self.practical)
        .bind(self.total_marks)
        .bind(&self.grade)
        .bind(self.typing_wpm)
        .bind(self.typing_marks)
        .bind(&self.typing_grade)
        .bind(self.active_status)
        .bind(self.certificate_downloaded)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(db.pool())
        .await
        .map_err(map_write_error)?;
        log::info!("Student `{}` saved", self.user_id);
        Ok(())
    }

    /// Persist every mutable field of an existing record.
    pub async fn save(&self, db: &Db) -> Result<()> {
        sqlx::query(
            "UPDATE students SET user_id = ?2, name = ?3, fathername = ?4, mothername = ?5, address = ?6, \
             dob = ?7, dor = ?8, gender = ?9, mobile = ?10, image = ?11, password_hash = ?12, \
             branch_name = ?13, branch_code = ?14, theory = ?15, practical = ?16, total_marks = ?17, \
             grade = ?18, typing_wpm = ?19, typing_marks = ?20, typing_grade = ?21, active_status = ?22, \
             certificate_downloaded = ?23, updated_at = ?24 WHERE id = ?1",
        )
        .bind(&self.id)
        .bind(&self.user_id)
        .bind(&self.name)
        .bind(&self.fathername)
        .bind(&self.mothername)
        .bind(&self.address)
        .bind(&self.dob)
        .bind(&self.dor)
        .bind(&self.gender)
        .bind(&self.mobile)
        .bind(&self.image)
        .bind(&self.password_hash)
        .bind(&self.branch_name)
        .bind(&self.branch_code)
        .bind(self.theory)
        .bind(self.practical)
        .bind(self.total_marks)
        .bind(&self.grade)
        .bind(self.typing_wpm)
        .bind(self.typing_marks)
        .bind(&self.typing_grade)
        .bind(self.active_status)
        .bind(self.certificate_downloaded)
        .bind(self.updated_at)
        .execute(db.pool())
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    pub async fn find_by_id(db: &Db, id: &str) -> Result<Option<Student>> {
        Ok(sqlx::query_as("SELECT * FROM students WHERE id = ?1")
            .bind(id)
            .fetch_optional(db.pool())
            .await?)
    }

    pub async fn find_by_user_id(db: &Db, user_id: &str) -> Result<Option<Student>> {
        Ok(sqlx::query_as("SELECT * FROM students WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?)
    }

    pub async fn find_by_mobile(db: &Db, mobile: &str) -> Result<Option<Student>> {
        Ok(sqlx::query_as("SELECT * FROM students WHERE mobile = ?1")
            .bind(mobile)
            .fetch_optional(db.pool())
            .await?)
    }

    /// All students, or only those of one branch.
    pub async fn list(db: &Db, branch_name: Option<&str>) -> Result<Vec<Student>> {
        let rows = match branch_name {
            Some(branch) => {
                sqlx::query_as(
                    "SELECT * FROM students WHERE branch_name = ?1 ORDER BY created_at DESC, rowid DESC",
                )
                .bind(branch)
                .fetch_all(db.pool())
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM students ORDER BY created_at DESC, rowid DESC")
                    .fetch_all(db.pool())
                    .await?
            }
        };
        Ok(rows)
    }

    /// Identifier of the most recently created record with this role in a branch.
    pub async fn last_user_id_in_branch(
        db: &Db,
        role: &str,
        branch_code: &str,
    ) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT user_id FROM students WHERE role = ?1 AND branch_code = ?2 \
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(role)
        .bind(branch_code)
        .fetch_optional(db.pool())
        .await?;
        Ok(row.map(|(id,)| id))
    }

    pub async fn delete(db: &Db, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?1")
            .bind(id)
            .execute(db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_certificate_downloaded(db: &Db, id: &str) -> Result<Option<Student>> {
        sqlx::query(
            "UPDATE students SET certificate_downloaded = 1, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(db.pool())
        .await?;
        Student::find_by_id(db, id).await
    }

    pub fn public(&self) -> StudentPublic {
        StudentPublic::from(self)
    }
}

/// Convenience for call sites holding the shared handle.
pub async fn find_student(db: &Arc<Db>, id: &str) -> Result<Student> {
    Student::find_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found."))
}
