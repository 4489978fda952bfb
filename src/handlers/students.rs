//! Student registration and maintenance. Branch admins only ever see and
//! touch students of their own branch.
use serde::Deserialize;
use serde_json::json;

use super::{data, field, loose_string, ok, ok_with, parse_flag, present, require};
use crate::auth::AuthContext;
use crate::auth::password::PasswordManager;
use crate::error::{AppError, Result};
use crate::ident::next_user_id;
use crate::marks::{FULL_MARKS, MAX_WPM, MarkInput, MarkSheet, parse_mark};
use crate::models::admin::Admin;
use crate::models::branch::Branch;
use crate::models::student::{Student, find_student};
use crate::models::{new_id, now};
use crate::router::{Request, Response};
use crate::state::AppState;
use crate::storage::{upload_all, validate_images};

/// Most images accepted with one registration.
pub const MAX_REGISTRATION_IMAGES: usize = 10;

const DEFAULT_ROLE: &str = "student";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fathername: Option<String>,
    #[serde(default)]
    pub mothername: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub dor: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub mobile: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub branch_code: Option<String>,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub course_duration: Option<String>,
    #[serde(default)]
    pub course_content: Option<String>,
    #[serde(default)]
    pub highest_qualification: Option<String>,
}

async fn ensure_mobile_not_admin(state: &AppState, mobile: &str) -> Result<()> {
    if Admin::find_by_mobile(&state.db, mobile).await?.is_some() {
        return Err(AppError::validation(
            "Mobile is already registered as an Admin",
        ));
    }
    Ok(())
}

/// `POST /register-user` (multipart): create a student with a fresh
/// registration number in their branch.
pub async fn create(req: Request, state: AppState) -> Result<Response> {
    let auth = AuthContext::load(&state, &req).await?;
    let form: NewStudent = req.decode()?;

    // duplicates are rejected before anything else is looked at
    if let Some(mobile) = present(&form.mobile) {
        if Student::find_by_mobile(&state.db, mobile).await?.is_some() {
            return Err(AppError::validation(
                "User with this Phone number already exists",
            ));
        }
        ensure_mobile_not_admin(&state, mobile).await?;
    }

    require(&[
        ("name", &form.name),
        ("fathername", &form.fathername),
        ("mothername", &form.mothername),
        ("address", &form.address),
        ("dob", &form.dob),
        ("dor", &form.dor),
        ("gender", &form.gender),
        ("mobile", &form.mobile),
        ("password", &form.password),
        ("branchName", &form.branch_name),
        ("branchCode", &form.branch_code),
        ("courseName", &form.course_name),
        ("courseDuration", &form.course_duration),
        ("courseContent", &form.course_content),
        ("highestQualification", &form.highest_qualification),
    ])?;
    let files = req.files();
    validate_images(
        files,
        1,
        MAX_REGISTRATION_IMAGES,
        state.settings.max_image_bytes,
    )?;

    let branch_name = field("branchName", &form.branch_name)?;
    auth.ensure_branch(
        &branch_name,
        "Branch Admin can only add students to their own branch",
    )?;
    let password = field("password", &form.password)?;
    PasswordManager::check_strength(&password)?;

    // the stored branch decides the code, so sequences stay branch-scoped
    let branch = Branch::find_by_name(&state.db, &branch_name)
        .await?
        .ok_or_else(|| AppError::not_found("Branch not found"))?;
    let submitted_code = field("branchCode", &form.branch_code)?;
    if submitted_code != branch.branch_code {
        return Err(AppError::validation(format!(
            "Branch code `{}` does not belong to {}",
            submitted_code, branch.branch_name
        )));
    }
    let branch_code = branch.branch_code;

    let role = present(&form.role).unwrap_or(DEFAULT_ROLE).to_string();
    let last = Student::last_user_id_in_branch(&state.db, &role, &branch_code).await?;
    let user_id = next_user_id(&branch_code, last.as_deref())?;

    let password_hash = PasswordManager::hash_password(&password)?;
    let urls = upload_all(state.images.as_ref(), "students", files).await?;
    let image = urls.into_iter().next().unwrap_or_default();

    let created_at = now();
    let student = Student {
        id: new_id(),
        user_id,
        name: field("name", &form.name)?,
        fathername: field("fathername", &form.fathername)?,
        mothername: field("mothername", &form.mothername)?,
        address: field("address", &form.address)?,
        dob: field("dob", &form.dob)?,
        dor: field("dor", &form.dor)?,
        gender: field("gender", &form.gender)?,
        mobile: field("mobile", &form.mobile)?,
        highest_qualification: field("highestQualification", &form.highest_qualification)?,
        image,
        password_hash: Some(password_hash),
        role,
        branch_name,
        branch_code,
        course_name: field("courseName", &form.course_name)?,
        course_duration: field("courseDuration", &form.course_duration)?,
        course_content: field("courseContent", &form.course_content)?,
        theory: None,
        practical: None,
        total_marks: None,
        grade: None,
        typing_wpm: None,
        typing_marks: None,
        typing_grade: None,
        active_status: true,
        certificate_downloaded: false,
        created_at,
        updated_at: created_at,
    };
    student.insert(&state.db).await?;

    Ok(ok_with(
        "Student registered successfully",
        json!({ "_id": student.id, "userId": student.user_id }),
    ))
}

/// `GET /get-all-users`
pub async fn list(req: Request, state: AppState) -> Result<Response> {
    let auth = AuthContext::load(&state, &req).await?;
    Ok(data(Student::list(&state.db, auth.branch_scope()).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByUserId {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `POST /get-user-by-id`: lookup by registration number.
pub async fn get_by_user_id(req: Request, state: AppState) -> Result<Response> {
    let auth = AuthContext::load(&state, &req).await?;
    let body: ByUserId = req.decode()?;
    let user_id = present(&body.user_id)
        .ok_or_else(|| AppError::validation("Registration number is required."))?;
    let student = Student::find_by_user_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found."))?;
    auth.ensure_branch(
        &student.branch_name,
        "Cannot generate certificate from other branches.",
    )?;
    Ok(data(student))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fathername: Option<String>,
    #[serde(default)]
    pub mothername: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub dor: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub mobile: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub practical: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub theory: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub typing_marks: Option<String>,
    #[serde(default, rename = "typingWPM", deserialize_with = "loose_string")]
    pub typing_wpm: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub active_status: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl StudentUpdate {
    fn marks(&self) -> Result<MarkInput> {
        let mark = |name: &str, raw: &Option<String>, max: i64| {
            parse_mark(name, raw.as_deref(), max).map_err(AppError::Validation)
        };
        Ok(MarkInput {
            theory: mark("theory", &self.theory, FULL_MARKS)?,
            practical: mark("practical", &self.practical, FULL_MARKS)?,
            typing_marks: mark("typingMarks", &self.typing_marks, FULL_MARKS)?,
            typing_wpm: mark("typingWPM", &self.typing_wpm, MAX_WPM)?,
        })
    }
}

fn replace(target: &mut String, value: &Option<String>) {
    if let Some(v) = present(value) {
        *target = v.to_string();
    }
}

/// `PUT /update-user/:id`: partial update. Totals and grades are always
/// recomputed from the submitted or stored marks.
pub async fn update(req: Request, state: AppState) -> Result<Response> {
    let auth = AuthContext::load(&state, &req).await?;
    let mut student = find_student(&state.db, req.param("id")?).await?;
    auth.ensure_branch(
        &student.branch_name,
        "Cannot update users from other branches.",
    )?;
    let form: StudentUpdate = req.decode()?;
    let submitted = form.marks()?;
    let active_status = parse_flag("activeStatus", &form.active_status)?;

    // a super admin moving a student renumbers them in the new branch
    if let Some(branch_name) = present(&form.branch_name) {
        if auth.is_super() && branch_name != student.branch_name {
            let branch = Branch::find_by_name(&state.db, branch_name)
                .await?
                .ok_or_else(|| AppError::not_found("Branch not found"))?;
            let last =
                Student::last_user_id_in_branch(&state.db, &student.role, &branch.branch_code)
                    .await?;
            student.user_id = next_user_id(&branch.branch_code, last.as_deref())?;
            student.branch_name = branch.branch_name;
            student.branch_code = branch.branch_code;
            log::info!("Student `{}` moved to {}", student.id, student.branch_name);
        }
    }

    if let Some(mobile) = present(&form.mobile) {
        if mobile != student.mobile {
            ensure_mobile_not_admin(&state, mobile).await?;
        }
    }

    if let Some(password) = present(&form.password) {
        PasswordManager::check_strength(password)?;
        student.password_hash = Some(PasswordManager::hash_password(password)?);
    }

    let files = req.files();
    if !files.is_empty() {
        validate_images(
            files,
            1,
            MAX_REGISTRATION_IMAGES,
            state.settings.max_image_bytes,
        )?;
        student.image = state.images.upload("students", &files[0]).await?;
    }

    let stored = MarkInput {
        theory: student.theory,
        practical: student.practical,
        typing_marks: student.typing_marks,
        typing_wpm: student.typing_wpm,
    };
    let sheet = MarkSheet::compute(submitted, stored).map_err(AppError::Validation)?;
    student.theory = Some(sheet.theory);
    student.practical = Some(sheet.practical);
    student.total_marks = Some(sheet.total);
    student.grade = Some(sheet.grade.to_string());
    student.typing_marks = Some(sheet.typing_marks);
    student.typing_wpm = Some(sheet.typing_wpm);
    student.typing_grade = Some(sheet.typing_grade.to_string());

    replace(&mut student.name, &form.name);
    replace(&mut student.fathername, &form.fathername);
    replace(&mut student.mothername, &form.mothername);
    replace(&mut student.address, &form.address);
    replace(&mut student.dob, &form.dob);
    replace(&mut student.dor, &form.dor);
    replace(&mut student.gender, &form.gender);
    replace(&mut student.mobile, &form.mobile);
    if let Some(active) = active_status {
        student.active_status = active;
    }
    student.updated_at = now();
    student.save(&state.db).await?;

    Ok(ok_with("User updated successfully.", student))
}

/// `PUT /update-certificate-status/:id`
pub async fn certificate_status(req: Request, state: AppState) -> Result<Response> {
    let auth = AuthContext::load(&state, &req).await?;
    let student = find_student(&state.db, req.param("id")?).await?;
    auth.ensure_branch(
        &student.branch_name,
        "Cannot update users from other branches.",
    )?;
    let updated = Student::mark_certificate_downloaded(&state.db, &student.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ok_with("Certificate download status updated", updated))
}

/// `DELETE /delete-user/:id`
pub async fn delete(req: Request, state: AppState) -> Result<Response> {
    let auth = AuthContext::load(&state, &req).await?;
    let student = find_student(&state.db, req.param("id")?).await?;
    auth.ensure_branch(
        &student.branch_name,
        "Cannot delete users from other branches.",
    )?;
    Student::delete(&state.db, &student.id).await?;
    log::info!("Student `{}` deleted", student.user_id);
    Ok(ok("User deleted successfully."))
}
