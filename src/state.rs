use std::sync::Arc;

use crate::auth::token::TokenKeys;
use crate::error::Result;
use crate::mailer::{Mailer, SmtpMailer, UnconfiguredMailer};
use crate::orm::Db;
use crate::settings::{Settings, StorageSettings};
use crate::storage::{CloudinaryStore, ImageStore, LocalImageStore};

/// Shared, cheaply clonable handles every handler receives.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub settings: Settings,
    pub tokens: TokenKeys,
    pub mailer: Arc<dyn Mailer>,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    pub fn new(
        db: Arc<Db>,
        settings: Settings,
        mailer: Arc<dyn Mailer>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        let tokens = TokenKeys::new(&settings.jwt_secret, settings.session_days);
        AppState {
            db,
            settings,
            tokens,
            mailer,
            images,
        }
    }

    /// Wire up the production mailer and image store from settings.
    pub fn from_settings(db: Arc<Db>, settings: Settings) -> Result<Self> {
        let mailer: Arc<dyn Mailer> = match &settings.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp.clone())),
            None => Arc::new(UnconfiguredMailer),
        };
        let images: Arc<dyn ImageStore> = match &settings.storage {
            StorageSettings::Cloudinary {
                cloud_name,
                api_key,
                api_secret,
            } => Arc::new(CloudinaryStore::new(cloud_name, api_key, api_secret)),
            StorageSettings::Local { dir } => {
                Arc::new(LocalImageStore::new(dir.clone(), &settings.public_url)?)
            }
        };
        Ok(AppState::new(db, settings, mailer, images))
    }
}
