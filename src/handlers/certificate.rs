//! Certificate bundle download and single-overlay preview.
use chrono::Local;
use serde::Deserialize;

use super::present;
use crate::auth::AuthContext;
use crate::certificate::preview::render_svg;
use crate::certificate::{Overlay, OverlayKind, bundle_file_name, render_bundle};
use crate::error::{AppError, Result};
use crate::models::student::Student;
use crate::router::{Request, Response};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

async fn student_in_scope(
    state: &AppState,
    auth: &AuthContext,
    user_id: &str,
) -> Result<Student> {
    let student = Student::find_by_user_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found."))?;
    auth.ensure_branch(
        &student.branch_name,
        "Cannot generate certificate from other branches.",
    )?;
    Ok(student)
}

/// `POST /certificate`: certificate, marksheet and typing certificate as one PDF.
pub async fn bundle(req: Request, state: AppState) -> Result<Response> {
    let auth = AuthContext::load(&state, &req).await?;
    let body: BundleRequest = req.decode()?;
    let user_id = present(&body.user_id)
        .ok_or_else(|| AppError::validation("Registration number is required."))?;
    let student = student_in_scope(&state, &auth, user_id).await?;

    let pdf = render_bundle(
        &state.settings.certificate.assets_dir,
        &student,
        &state.settings.public_url,
        Local::now().date_naive(),
    )
    .await?;

    Ok(Response::bytes(pdf, "application/pdf").with_header(
        "Content-Disposition",
        format!(
            "attachment; filename=\"{}\"",
            bundle_file_name(&student.user_id)
        ),
    ))
}

/// `GET /certificate-preview/:kind/:userId`: one overlay as SVG.
pub async fn preview(req: Request, state: AppState) -> Result<Response> {
    let auth = AuthContext::load(&state, &req).await?;
    let kind: OverlayKind = req.param("kind")?.parse()?;
    let student = student_in_scope(&state, &auth, req.param("userId")?).await?;

    let overlay = Overlay::build(
        kind,
        &student,
        &state.settings.public_url,
        Local::now().date_naive(),
    );
    let svg = render_svg(
        &state.settings.template.dir,
        &state.settings.certificate.assets_dir,
        &overlay,
    )
    .await?;
    Ok(Response::bytes(svg.into_bytes(), "image/svg+xml"))
}
