use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use log::{info, warn};

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct TemplateSettings {
    pub dir: String,
    pub debug: bool,
}

/// Where background images for the certificate overlays live.
#[derive(Clone, Debug)]
pub struct CertificateSettings {
    pub assets_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
}

#[derive(Clone, Debug)]
pub enum StorageSettings {
    Cloudinary {
        cloud_name: String,
        api_key: String,
        api_secret: String,
    },
    Local {
        dir: PathBuf,
    },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub migrations_dir: String,
    /// Base URL the public site is reachable at, used in QR codes and emails.
    pub public_url: String,
    pub jwt_secret: String,
    pub session_days: i64,
    pub max_image_bytes: usize,
    pub max_body_bytes: usize,
    pub template: TemplateSettings,
    pub certificate: CertificateSettings,
    pub smtp: Option<SmtpSettings>,
    pub storage: StorageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debug: true,
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_url: "sqlite::memory:".to_string(),
            migrations_dir: "migrations".to_string(),
            public_url: "http://localhost:3000".to_string(),
            jwt_secret: "development-secret-change-me".to_string(),
            session_days: 7,
            max_image_bytes: 500 * 1024,
            max_body_bytes: 8 * 1024 * 1024,
            template: TemplateSettings {
                dir: "templates".to_string(),
                debug: true,
            },
            certificate: CertificateSettings {
                assets_dir: PathBuf::from("assets"),
            },
            smtp: None,
            storage: StorageSettings::Local {
                dir: PathBuf::from("uploads"),
            },
        }
    }
}

impl Settings {
    /// Build settings from the process environment, reading `.env` first.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        let defaults = Settings::default();

        let debug: bool = try_load("DEBUG", "false")?;
        let port: u16 = try_load("PORT", &defaults.port.to_string())?;
        let public_url = var("PUBLIC_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

        let jwt_secret = match var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if debug => defaults.jwt_secret.clone(),
            Err(_) => {
                return Err(AppError::Internal(
                    "JWT_SECRET must be set when DEBUG is off".to_string(),
                ));
            }
        };

        let smtp = match (var("SMTP_HOST"), var("SMTP_USER"), var("SMTP_PASS")) {
            (Ok(host), Ok(user), Ok(password)) => Some(SmtpSettings {
                host,
                port: try_load("SMTP_PORT", "587")?,
                from: var("MAIL_FROM").unwrap_or_else(|_| user.clone()),
                user,
                password,
            }),
            _ => {
                warn!("SMTP is not configured, outgoing mail will fail");
                None
            }
        };

        let storage = match (
            var("CLOUDINARY_CLOUD_NAME"),
            var("CLOUDINARY_API_KEY"),
            var("CLOUDINARY_API_SECRET"),
        ) {
            (Ok(cloud_name), Ok(api_key), Ok(api_secret)) => StorageSettings::Cloudinary {
                cloud_name,
                api_key,
                api_secret,
            },
            _ => {
                let dir: String = try_load("UPLOAD_DIR", "uploads")?;
                info!("Cloudinary not configured, storing images under `{dir}`");
                StorageSettings::Local {
                    dir: PathBuf::from(dir),
                }
            }
        };

        Ok(Settings {
            debug,
            host: try_load("HOST", "0.0.0.0")?,
            port,
            database_url: try_load("DATABASE_URL", "sqlite://certdesk.db")?,
            migrations_dir: try_load("MIGRATIONS_DIR", &defaults.migrations_dir)?,
            public_url: public_url.trim_end_matches('/').to_string(),
            jwt_secret,
            session_days: try_load("SESSION_DAYS", "7")?,
            max_image_bytes: try_load("MAX_IMAGE_BYTES", &defaults.max_image_bytes.to_string())?,
            max_body_bytes: defaults.max_body_bytes,
            template: TemplateSettings {
                dir: try_load("TEMPLATE_DIR", "templates")?,
                debug,
            },
            certificate: CertificateSettings {
                assets_dir: PathBuf::from(try_load::<String>("CERT_ASSETS_DIR", "assets")?),
            },
            smtp,
            storage,
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        log::debug!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, AppError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            AppError::Internal(format!("Environment misconfigured: {key}: {e}"))
        })
}
