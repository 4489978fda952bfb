//! Image uploads. Only the resulting URL is ever persisted.
use std::path::{Path, PathBuf};

use chrono::Utc;
use futures::future::try_join_all;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::router::UploadedFile;

#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    /// Store one image under `folder` and return its public URL.
    async fn upload(&self, folder: &str, file: &UploadedFile) -> Result<String>;
}

/// Upload several files concurrently, keeping their order.
pub async fn upload_all(
    store: &dyn ImageStore,
    folder: &str,
    files: &[UploadedFile],
) -> Result<Vec<String>> {
    try_join_all(files.iter().map(|file| store.upload(folder, file))).await
}

/// Raster formats accepted for upload. SVG is excluded: it can carry script.
pub const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// MIME type and extension of an accepted image, judged by its leading
/// bytes. The client's content type and file name are not trusted.
pub fn sniff_image(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    infer::get(bytes)
        .filter(|kind| ACCEPTED_IMAGE_TYPES.contains(&kind.mime_type()))
        .map(|kind| (kind.mime_type(), kind.extension()))
}

/// Check count, type and size of uploaded images before anything is stored.
pub fn validate_images(
    files: &[UploadedFile],
    min: usize,
    max: usize,
    max_bytes: usize,
) -> Result<()> {
    if files.len() < min {
        return Err(AppError::validation(if min == 1 {
            "At least one image must be provided.".to_string()
        } else {
            format!("At least {} images must be provided.", min)
        }));
    }
    if files.len() > max {
        return Err(AppError::validation(format!(
            "At most {} images can be uploaded at once.",
            max
        )));
    }
    if let Some(file) = files.iter().find(|f| sniff_image(&f.bytes).is_none()) {
        return Err(AppError::validation(format!(
            "`{}` is not a JPEG, PNG, GIF or WebP image.",
            file.file_name
        )));
    }
    if files.iter().any(|f| f.bytes.len() > max_bytes) {
        return Err(AppError::validation(format!(
            "The image file must be less than {} KB.",
            max_bytes / 1024
        )));
    }
    Ok(())
}

/// `<original stem>_<unix millis>`, restricted to URL-safe characters.
pub fn public_id(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "image".to_string() } else { stem };
    format!("{}_{}", stem, Utc::now().timestamp_millis())
}

/// Signed uploads to Cloudinary's REST API.
pub struct CloudinaryStore {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(serde::Deserialize)]
struct CloudinaryResponse {
    secure_url: Option<String>,
    error: Option<CloudinaryError>,
}

#[derive(serde::Deserialize)]
struct CloudinaryError {
    message: String,
}

impl CloudinaryStore {
    pub fn new(cloud_name: &str, api_key: &str, api_secret: &str) -> Self {
        CloudinaryStore {
            client: reqwest::Client::new(),
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        }
    }

    /// SHA-256 over the alphabetically sorted signed params followed by the secret.
    pub fn sign(params: &[(&str, &str)], secret: &str) -> String {
        let mut sorted: Vec<_> = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined: Vec<String> = sorted.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        let mut hasher = Sha256::new();
        hasher.update(joined.join("&").as_bytes());
        hasher.update(secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait::async_trait]
impl ImageStore for CloudinaryStore {
    async fn upload(&self, folder: &str, file: &UploadedFile) -> Result<String> {
        let timestamp = Utc::now().timestamp().to_string();
        let public_id = public_id(&file.file_name);
        let signature = Self::sign(
            &[
                ("folder", folder),
                ("public_id", &public_id),
                ("timestamp", &timestamp),
            ],
            &self.api_secret,
        );

        let (mime, _) = sniff_image(&file.bytes)
            .ok_or_else(|| AppError::validation(format!("`{}` is not an image.", file.file_name)))?;
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(mime)
            .map_err(|e| AppError::Upload(format!("Invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("public_id", public_id)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        );
        let response: CloudinaryResponse = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("Cloudinary request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Upload(format!("Cloudinary response unreadable: {}", e)))?;

        match (response.secure_url, response.error) {
            (Some(url), _) => {
                log::info!("Uploaded `{}` to {}", file.file_name, url);
                Ok(url)
            }
            (None, Some(err)) => Err(AppError::Upload(err.message)),
            (None, None) => Err(AppError::Upload("Cloudinary returned no URL".to_string())),
        }
    }
}

/// Writes images to a local directory served under `/uploads`.
pub struct LocalImageStore {
    dir: PathBuf,
    base_url: String,
}

impl LocalImageStore {
    pub fn new(dir: PathBuf, public_url: &str) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(LocalImageStore {
            dir,
            base_url: format!("{}/uploads", public_url.trim_end_matches('/')),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a served file name to a path inside the upload dir.
    pub fn resolve(dir: &Path, file_name: &str) -> Option<PathBuf> {
        let valid = !file_name.is_empty()
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !file_name.starts_with('.');
        valid.then(|| dir.join(file_name))
    }
}

#[async_trait::async_trait]
impl ImageStore for LocalImageStore {
    async fn upload(&self, folder: &str, file: &UploadedFile) -> Result<String> {
        // the stored extension decides the served content type
        let (_, extension) = sniff_image(&file.bytes)
            .ok_or_else(|| AppError::validation(format!("`{}` is not an image.", file.file_name)))?;
        let folder: String = folder
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let name = format!(
            "{}-{}-{}.{}",
            folder,
            public_id(&file.file_name),
            &uuid::Uuid::new_v4().simple().to_string()[..8],
            extension
        );
        tokio::fs::write(self.dir.join(&name), &file.bytes)
            .await
            .map_err(|e| AppError::Upload(format!("Failed to store image: {}", e)))?;
        Ok(format!("{}/{}", self.base_url, name))
    }
}

pub fn content_type_for(file_name: &str) -> &'static str {
    match Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
