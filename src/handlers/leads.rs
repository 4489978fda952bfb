//! Public lead capture and the admin notification feed built from it.
use serde::Deserialize;
use serde_json::json;

use super::{data, field, loose_string, ok, present, require};
use crate::auth::AuthContext;
use crate::error::{AppError, Result};
use crate::models::lead::{ContactMessage, CourseApplication, CourseInquiry, LeadKind};
use crate::models::{new_id, now};
use crate::router::{Request, Response};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct NewApplication {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub mobile: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub center: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
}

/// `POST /applyCourse`
pub async fn apply(req: Request, state: AppState) -> Result<Response> {
    let form: NewApplication = req.decode()?;
    require(&[
        ("name", &form.name),
        ("mobile", &form.mobile),
        ("center", &form.center),
        ("course", &form.course),
    ])?;
    CourseApplication {
        id: new_id(),
        name: field("name", &form.name)?,
        mobile: field("mobile", &form.mobile)?,
        email: present(&form.email).map(str::to_string),
        center: field("center", &form.center)?,
        course: field("course", &form.course)?,
        created_at: now(),
    }
    .insert(&state.db)
    .await?;
    Ok(ok("Applied. We will contact you soon"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInquiry {
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub ph: Option<String>,
}

/// `POST /apply-in-a-course`
pub async fn inquire(req: Request, state: AppState) -> Result<Response> {
    let form: NewInquiry = req.decode()?;
    require(&[
        ("courseName", &form.course_name),
        ("name", &form.name),
        ("ph", &form.ph),
    ])?;
    CourseInquiry {
        id: new_id(),
        course_name: field("courseName", &form.course_name)?,
        name: field("name", &form.name)?,
        ph: field("ph", &form.ph)?,
        created_at: now(),
    }
    .insert(&state.db)
    .await?;
    Ok(ok("Applied, We will contact you soon"))
}

#[derive(Deserialize)]
pub struct NewMessage {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub ph: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

/// `POST /send-msg`
pub async fn send_message(req: Request, state: AppState) -> Result<Response> {
    let form: NewMessage = req.decode()?;
    require(&[("name", &form.name), ("ph", &form.ph), ("msg", &form.msg)])?;
    ContactMessage {
        id: new_id(),
        name: field("name", &form.name)?,
        ph: field("ph", &form.ph)?,
        email: present(&form.email).map(str::to_string),
        msg: field("msg", &form.msg)?,
        created_at: now(),
    }
    .insert(&state.db)
    .await?;
    Ok(ok("We will contact you"))
}

/// `GET /get-notification`: counts plus the three lead collections.
pub async fn notifications(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?;
    let applications = LeadKind::Application.count(&state.db).await?;
    let inquiries = LeadKind::Inquiry.count(&state.db).await?;
    let messages = LeadKind::Message.count(&state.db).await?;

    Ok(data(json!({
        "branchCourseCount": applications,
        "totalCount": applications + inquiries + messages,
        "applyData": CourseApplication::list(&state.db).await?,
        "applyCourse": CourseInquiry::list(&state.db).await?,
        "sendMsg": ContactMessage::list(&state.db).await?,
    })))
}

/// `DELETE /delete-notification/:id/:type`
pub async fn delete_notification(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?;
    let kind: LeadKind = req.param("type")?.parse()?;
    if !kind.delete(&state.db, req.param("id")?).await? {
        return Err(AppError::not_found("Message not found"));
    }
    log::info!("Deleted {} notification", kind.tag());
    Ok(ok("Notification deleted successfully"))
}
