//! Branches and courses.
use serde::Deserialize;
use sqlx::types::Json;

use super::{data, field, loose_string, ok, ok_with, present, require};
use crate::auth::AuthContext;
use crate::error::{AppError, Result};
use crate::models::branch::Branch;
use crate::models::course::Course;
use crate::models::{new_id, now};
use crate::router::{Request, Response};
use crate::state::AppState;
use crate::storage::{upload_all, validate_images};

const MAX_CATALOG_IMAGES: usize = 10;

/// Optional gallery images attached to a branch or course.
async fn upload_optional(req: &Request, state: &AppState, folder: &str) -> Result<Vec<String>> {
    let files = req.files();
    if files.is_empty() {
        return Ok(Vec::new());
    }
    validate_images(files, 0, MAX_CATALOG_IMAGES, state.settings.max_image_bytes)?;
    upload_all(state.images.as_ref(), folder, files).await
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBranch {
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub branch_code: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// `POST /addBranch`
pub async fn add_branch(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?.require_super()?;
    let form: NewBranch = req.decode()?;
    require(&[
        ("branchName", &form.branch_name),
        ("branchCode", &form.branch_code),
    ])?;
    let images = upload_optional(&req, &state, "branches").await?;

    let branch = Branch {
        id: new_id(),
        branch_name: field("branchName", &form.branch_name)?,
        branch_code: field("branchCode", &form.branch_code)?,
        address: present(&form.address).unwrap_or_default().to_string(),
        images: Json(images),
        created_at: now(),
    };
    branch.insert(&state.db).await?;
    log::info!("Branch `{}` ({}) created", branch.branch_name, branch.branch_code);
    Ok(ok_with("Branch created successfully", branch))
}

/// `GET /getBranches`
pub async fn list_branches(_req: Request, state: AppState) -> Result<Response> {
    Ok(data(Branch::list(&state.db).await?))
}

/// `DELETE /deleteBranch/:id`
pub async fn delete_branch(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?.require_super()?;
    if !Branch::delete(&state.db, req.param("id")?).await? {
        return Err(AppError::not_found("Branch not found"));
    }
    Ok(ok("Branch deleted successfully"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub duration: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub fees: Option<String>,
}

/// `POST /addCourse`
pub async fn add_course(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?;
    let form: NewCourse = req.decode()?;
    require(&[
        ("courseName", &form.course_name),
        ("duration", &form.duration),
        ("content", &form.content),
    ])?;
    let images = upload_optional(&req, &state, "courses").await?;

    let course = Course {
        id: new_id(),
        course_name: field("courseName", &form.course_name)?,
        duration: field("duration", &form.duration)?,
        content: field("content", &form.content)?,
        fees: present(&form.fees).map(str::to_string),
        images: Json(images),
        created_at: now(),
    };
    course.insert(&state.db).await?;
    Ok(ok_with("Course added successfully", course))
}

/// `GET /getCourse`
pub async fn list_courses(_req: Request, state: AppState) -> Result<Response> {
    Ok(data(Course::list(&state.db).await?))
}

/// `DELETE /deleteCourse/:id`
pub async fn delete_course(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?.require_super()?;
    if !Course::delete(&state.db, req.param("id")?).await? {
        return Err(AppError::not_found("Course not found"));
    }
    Ok(ok("Course deleted successfully"))
}
