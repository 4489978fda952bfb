//! Branch admin management, super admin only.
use serde::Deserialize;

use super::{data, field, loose_string, ok, ok_with, present, require};
use crate::auth::AuthContext;
use crate::auth::password::PasswordManager;
use crate::error::{AppError, Result};
use crate::models::admin::{Admin, AdminRole};
use crate::models::student::Student;
use crate::router::{Request, Response};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchAdminForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub mobile: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub branch_code: Option<String>,
}

async fn ensure_mobile_free_of_students(state: &AppState, mobile: &str) -> Result<()> {
    if Student::find_by_mobile(&state.db, mobile).await?.is_some() {
        return Err(AppError::validation(
            "Mobile is already registered as a student",
        ));
    }
    Ok(())
}

/// `POST /branchadmin`
pub async fn create(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?.require_super()?;
    let form: BranchAdminForm = req.decode()?;
    require(&[
        ("name", &form.name),
        ("email", &form.email),
        ("mobile", &form.mobile),
        ("password", &form.password),
        ("branchName", &form.branch_name),
        ("branchCode", &form.branch_code),
    ])?;
    let password = field("password", &form.password)?;
    PasswordManager::check_strength(&password)?;
    let mobile = field("mobile", &form.mobile)?;
    ensure_mobile_free_of_students(&state, &mobile).await?;

    let mut admin = Admin::new(
        field("name", &form.name)?,
        field("email", &form.email)?.to_lowercase(),
        mobile,
        PasswordManager::hash_password(&password)?,
        AdminRole::BranchAdmin,
    );
    admin.branch_name = Some(field("branchName", &form.branch_name)?);
    admin.branch_code = Some(field("branchCode", &form.branch_code)?);
    admin.is_verified = true;
    admin.insert(&state.db).await?;

    Ok(ok_with("Branch admin created successfully", admin))
}

/// `GET /get-all-branch-admins`
pub async fn list(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?.require_super()?;
    Ok(data(Admin::list_branch_admins(&state.db).await?))
}

async fn find_branch_admin(state: &AppState, id: &str) -> Result<Admin> {
    match Admin::find_by_id(&state.db, id).await? {
        Some(admin) if admin.role == AdminRole::BranchAdmin => Ok(admin),
        _ => Err(AppError::not_found("Branch admin not found")),
    }
}

/// `PUT /update-branch-admin/:id`: any subset of the creation fields.
pub async fn update(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?.require_super()?;
    let mut admin = find_branch_admin(&state, req.param("id")?).await?;
    let form: BranchAdminForm = req.decode()?;

    if let Some(name) = present(&form.name) {
        admin.name = name.to_string();
    }
    if let Some(email) = present(&form.email) {
        admin.email = email.to_lowercase();
    }
    if let Some(mobile) = present(&form.mobile) {
        if mobile != admin.mobile {
            ensure_mobile_free_of_students(&state, mobile).await?;
        }
        admin.mobile = mobile.to_string();
    }
    if let Some(password) = present(&form.password) {
        PasswordManager::check_strength(password)?;
        admin.password_hash = PasswordManager::hash_password(password)?;
    }
    if let Some(branch_name) = present(&form.branch_name) {
        admin.branch_name = Some(branch_name.to_string());
    }
    if let Some(branch_code) = present(&form.branch_code) {
        admin.branch_code = Some(branch_code.to_string());
    }
    admin.save(&state.db).await?;

    Ok(ok_with("Branch admin updated successfully", admin))
}

/// `DELETE /delete-branch-admin/:id`
pub async fn delete(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?.require_super()?;
    let admin = find_branch_admin(&state, req.param("id")?).await?;
    Admin::delete(&state.db, &admin.id).await?;
    log::info!("Branch admin `{}` deleted", admin.email);
    Ok(ok("Branch admin deleted successfully"))
}
