#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use certdesk::app::build_router;
use certdesk::auth::password::PasswordManager;
use certdesk::auth::{Session, SessionKind};
use certdesk::error::Result;
use certdesk::mailer::{Email, Mailer};
use certdesk::models::admin::{Admin, AdminRole};
use certdesk::models::branch::Branch;
use certdesk::models::{new_id, now};
use certdesk::orm::{Db, auto_migrate};
use certdesk::router::{FormData, Method, Request, Response, Router, UploadedFile};
use certdesk::settings::{Settings, StorageSettings};
use certdesk::state::AppState;
use certdesk::storage::LocalImageStore;
use sqlx::types::Json;
use tempfile::TempDir;

pub const PASSWORD: &str = "correct-horse";

/// Keeps every message in memory instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_to(&self, to: &str) -> Option<Email> {
        self.sent().into_iter().rev().find(|e| e.to == to)
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Fails every send, like an unreachable SMTP relay.
pub struct FailingMailer;

#[async_trait::async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, email: Email) -> Result<()> {
        Err(certdesk::error::AppError::Mail(format!("relay down for {}", email.to)))
    }
}

/// A fully wired app on an in-memory database. Uploads and certificate
/// assets live in a temp dir that is removed on drop.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mailer: Arc<RecordingMailer>,
    pub files: TempDir,
}

pub async fn test_app() -> TestApp {
    let db = Arc::new(Db::connect("sqlite::memory:").await.unwrap());
    auto_migrate(db.clone()).await.unwrap();

    let files = tempfile::tempdir().unwrap();
    let uploads = files.path().join("uploads");
    let mut settings = Settings::default();
    settings.template.dir = concat!(env!("CARGO_MANIFEST_DIR"), "/templates").to_string();
    settings.certificate.assets_dir = files.path().join("assets");
    settings.storage = StorageSettings::Local {
        dir: uploads.clone(),
    };

    let mailer = Arc::new(RecordingMailer::default());
    let images = Arc::new(LocalImageStore::new(uploads, &settings.public_url).unwrap());
    let state = AppState::new(db, settings, mailer.clone(), images);
    let router = build_router(&state);
    TestApp {
        state,
        router,
        mailer,
        files,
    }
}

impl TestApp {
    /// Swap the outgoing mail transport.
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.state.mailer = mailer;
        self.router = build_router(&self.state);
        self
    }

    pub async fn send(&self, req: Request) -> Response {
        self.router.dispatch(req, self.state.clone()).await
    }

    /// Insert a verified admin directly and return a session token for it.
    pub async fn admin(&self, mobile: &str, role: AdminRole, branch: Option<(&str, &str)>) -> String {
        let mut admin = Admin::new(
            format!("Admin {}", mobile),
            format!("{}@example.com", mobile),
            mobile.to_string(),
            PasswordManager::hash_password(PASSWORD).unwrap(),
            role,
        );
        admin.is_verified = true;
        if let Some((name, code)) = branch {
            admin.branch_name = Some(name.to_string());
            admin.branch_code = Some(code.to_string());
        }
        admin.insert(&self.state.db).await.unwrap();
        self.state
            .tokens
            .issue(&Session {
                subject_id: admin.id,
                kind: SessionKind::Admin,
            })
            .unwrap()
    }

    pub async fn super_admin(&self) -> String {
        self.admin("9000000000", AdminRole::Super, None).await
    }

    /// Insert a branch unless one with that name exists.
    pub async fn branch(&self, name: &str, code: &str) {
        if Branch::find_by_name(&self.state.db, name).await.unwrap().is_some() {
            return;
        }
        Branch {
            id: new_id(),
            branch_name: name.to_string(),
            branch_code: code.to_string(),
            address: String::new(),
            images: Json(Vec::new()),
            created_at: now(),
        }
        .insert(&self.state.db)
        .await
        .unwrap();
    }

    /// Register a student through the API and return its registration number.
    pub async fn register_student(&self, token: &str, mobile: &str, branch: (&str, &str)) -> String {
        self.branch(branch.0, branch.1).await;
        let resp = self
            .send(
                api(Method::POST, "/register-user")
                    .with_cookie("token", token)
                    .with_form(student_form(mobile, branch.0, branch.1)),
            )
            .await;
        assert_eq!(resp.status_code, 200, "{}", resp.text());
        resp.json_body().unwrap()["data"]["userId"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

pub fn api(method: Method, path: &str) -> Request {
    Request::new(method, &format!("/api/v1{}", path))
}

pub fn image(name: &str) -> UploadedFile {
    UploadedFile {
        field: "images".to_string(),
        file_name: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec(),
    }
}

pub fn student_form(mobile: &str, branch_name: &str, branch_code: &str) -> FormData {
    let fields: HashMap<String, String> = [
        ("name", "Asha Roy"),
        ("fathername", "Bimal Roy"),
        ("mothername", "Chaya Roy"),
        ("address", "12 Lake Road, Kolkata"),
        ("dob", "2001-04-12"),
        ("dor", "2024-01-15"),
        ("gender", "Female"),
        ("mobile", mobile),
        ("password", PASSWORD),
        ("branchName", branch_name),
        ("branchCode", branch_code),
        ("courseName", "Diploma in Computer Application"),
        ("courseDuration", "6 Months"),
        ("courseContent", "MS Word, MS Excel, Tally (GST), Internet"),
        ("highestQualification", "Higher Secondary"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    FormData {
        fields,
        files: vec![image("photo.png")],
    }
}

/// Percent-encode a registration number for use as a path segment.
pub fn encode_id(user_id: &str) -> String {
    user_id.replace('/', "%2F")
}
