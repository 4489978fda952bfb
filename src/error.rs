use std::collections::HashMap;

use serde_json::json;
use thiserror::Error;

use crate::router::Response;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Database(_)
            | AppError::Mail(_)
            | AppError::Upload(_)
            | AppError::Template(_)
            | AppError::Internal(_) => 500,
        }
    }

    /// Message safe to show to the caller. Server-side failures never leak details.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::NotFound(m) => m.clone(),
            AppError::Mail(_) => "Failed to send email, please try again later".to_string(),
            AppError::Upload(_) => "Image upload failed, please try again later".to_string(),
            AppError::Database(_) | AppError::Template(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status_code();
        if status >= 500 {
            log::error!("Request failed: {}", self);
        } else {
            log::warn!("Request rejected ({}): {}", status, self);
        }
        Response::json(
            json!({ "success": false, "message": self.public_message() }),
            status,
            HashMap::new(),
        )
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized(format!("Invalid session: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("Malformed payload: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
