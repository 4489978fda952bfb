//! Public certificate verification by registration number. No session
//! needed; the identifier arrives percent-encoded and is decoded by the router.
use std::collections::HashMap;

use super::data;
use crate::error::{AppError, Result};
use crate::models::student::{Student, StudentPublic};
use crate::router::{Request, Response};
use crate::state::AppState;
use crate::template::{TemplateValue, render_page};

/// `GET /api/v1/verify-user/:userId`
pub async fn verify_json(req: Request, state: AppState) -> Result<Response> {
    let user_id = req.param("userId")?;
    let student = Student::find_by_user_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found."))?;
    Ok(data(student.public()))
}

fn opt(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn detail_rows(s: &StudentPublic) -> Vec<TemplateValue> {
    [
        ("Name", s.name.clone()),
        ("Registration No.", s.user_id.clone()),
        ("Course Name", s.course_name.clone()),
        ("Father's Name", s.fathername.clone()),
        ("Mother's Name", s.mothername.clone()),
        ("Address", s.address.clone()),
        ("Date of Birth", s.dob.clone()),
        ("Date of Registration", s.dor.clone()),
        ("Gender", s.gender.clone()),
        ("Mobile", s.mobile.clone()),
        ("Branch Name", s.branch_name.clone()),
        ("Duration", s.course_duration.clone()),
        ("Grade", s.grade.clone().unwrap_or_default()),
        ("Theory Marks", opt(s.theory)),
        ("Practical Marks", opt(s.practical)),
        ("Total Marks", opt(s.total_marks)),
        ("Typing Marks", opt(s.typing_marks)),
        ("Typing WPM", opt(s.typing_wpm)),
        ("Typing Grade", s.typing_grade.clone().unwrap_or_default()),
    ]
    .into_iter()
    .map(|(label, value)| TemplateValue::object([("label", label.to_string()), ("value", value)]))
    .collect()
}

/// `GET /verify/:userId`: the page the certificate QR code points at.
pub async fn verify_page(req: Request, state: AppState) -> Result<Response> {
    let user_id = req.param("userId")?;
    let dir = &state.settings.template.dir;
    let mut context = HashMap::new();

    let Some(student) = Student::find_by_user_id(&state.db, user_id).await? else {
        context.insert("user_id".to_string(), TemplateValue::from(user_id));
        return render_page(dir, "not_found.html", &context, 404);
    };

    let public = student.public();
    context.insert(
        "student".to_string(),
        TemplateValue::object([
            ("userId", public.user_id.clone()),
            ("name", public.name.clone()),
            ("image", public.image.clone()),
        ]),
    );
    context.insert("rows".to_string(), TemplateValue::List(detail_rows(&public)));
    render_page(dir, "verify.html", &context, 200)
}
