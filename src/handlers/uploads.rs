//! Serves images written by the local image store.
use crate::error::{AppError, Result};
use crate::router::{Request, Response};
use crate::settings::StorageSettings;
use crate::state::AppState;
use crate::storage::{LocalImageStore, content_type_for};

/// `GET /uploads/:file`
pub async fn serve(req: Request, state: AppState) -> Result<Response> {
    let StorageSettings::Local { dir } = &state.settings.storage else {
        return Err(AppError::not_found("Not found"));
    };
    let file = req.param("file")?;
    let path = LocalImageStore::resolve(dir, file)
        .ok_or_else(|| AppError::not_found("Not found"))?;
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(Response::bytes(bytes, content_type_for(file))
            .with_header("Cache-Control", "public, max-age=86400")
            .with_header("X-Content-Type-Options", "nosniff")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::not_found("Not found"))
        }
        Err(e) => Err(e.into()),
    }
}
