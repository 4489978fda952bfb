//! Team members, activities and the recent image gallery.
use serde::Deserialize;

use super::{data, field, ok_with, present, require};
use crate::auth::AuthContext;
use crate::error::Result;
use crate::models::activity::Activity;
use crate::models::image::RecentImage;
use crate::models::team::TeamMember;
use crate::models::{new_id, now};
use crate::router::{Request, Response};
use crate::state::AppState;
use crate::storage::{upload_all, validate_images};

/// Most gallery images per upload request.
pub const MAX_GALLERY_IMAGES: usize = 5;

#[derive(Deserialize)]
pub struct NewTeamMember {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub designation: Option<String>,
}

/// `POST /create-team` (multipart, exactly one image)
pub async fn create_team_member(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?;
    let form: NewTeamMember = req.decode()?;
    require(&[("name", &form.name), ("designation", &form.designation)])?;
    let files = req.files();
    validate_images(files, 1, 1, state.settings.max_image_bytes)?;
    let image = state.images.upload("team", &files[0]).await?;

    let member = TeamMember {
        id: new_id(),
        name: field("name", &form.name)?,
        designation: field("designation", &form.designation)?,
        image,
        created_at: now(),
    };
    member.insert(&state.db).await?;
    Ok(ok_with("Team member created successfully", member))
}

/// `GET /get-team-member`
pub async fn list_team(_req: Request, state: AppState) -> Result<Response> {
    Ok(data(TeamMember::list(&state.db).await?))
}

#[derive(Deserialize)]
pub struct NewActivity {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// `POST /create-activity`
pub async fn create_activity(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?;
    let form: NewActivity = req.decode()?;
    require(&[("title", &form.title), ("description", &form.description)])?;

    let activity = Activity {
        id: new_id(),
        title: field("title", &form.title)?,
        description: field("description", &form.description)?,
        date: present(&form.date).map(str::to_string),
        created_at: now(),
    };
    activity.insert(&state.db).await?;
    Ok(ok_with("Activity created successfully", activity))
}

/// `GET /get-activity`: newest first.
pub async fn list_activities(_req: Request, state: AppState) -> Result<Response> {
    Ok(data(Activity::list(&state.db).await?))
}

/// `POST /upload-image`: up to five gallery images at once.
pub async fn upload_images(req: Request, state: AppState) -> Result<Response> {
    AuthContext::load(&state, &req).await?;
    let files = req.files();
    validate_images(
        files,
        1,
        MAX_GALLERY_IMAGES,
        state.settings.max_image_bytes,
    )?;
    let urls = upload_all(state.images.as_ref(), "recent", files).await?;

    let mut saved = Vec::with_capacity(urls.len());
    for url in urls {
        let image = RecentImage {
            id: new_id(),
            url,
            created_at: now(),
        };
        image.insert(&state.db).await?;
        saved.push(image);
    }
    Ok(ok_with("Images uploaded successfully", saved))
}

/// `GET /recent`
pub async fn recent_images(_req: Request, state: AppState) -> Result<Response> {
    Ok(data(RecentImage::recent(&state.db).await?))
}
