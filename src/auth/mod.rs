//! Sessions and the request-scoped authorization context.
//!
//! A session is decoded from the `token` cookie by [`session_middleware`];
//! admin handlers then load an [`AuthContext`] from the stored admin record so
//! role and branch always reflect the database, not the token.
pub mod otp;
pub mod password;
pub mod token;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::admin::{Admin, AdminRole};
use crate::router::{Middleware, Request, Response};
use crate::state::AppState;
use token::{SESSION_COOKIE, TokenKeys};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Admin,
    Student,
}

/// Identity carried by a valid session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub subject_id: String,
    pub kind: SessionKind,
}

/// Who is calling an admin endpoint, as read from their admin record.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub admin_id: String,
    pub role: AdminRole,
    pub branch_name: Option<String>,
}

impl AuthContext {
    pub fn from_admin(admin: &Admin) -> Self {
        AuthContext {
            admin_id: admin.id.clone(),
            role: admin.role,
            branch_name: admin.branch_name.clone(),
        }
    }

    /// Resolve the admin behind the request's session.
    pub async fn load(state: &AppState, req: &Request) -> Result<Self> {
        let session = req
            .session
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Not authorized, please log in".to_string()))?;
        if session.kind != SessionKind::Admin {
            return Err(AppError::forbidden("Access denied."));
        }
        let admin = Admin::find_by_id(&state.db, &session.subject_id)
            .await?
            .ok_or_else(|| AppError::forbidden("Access denied."))?;
        Ok(AuthContext::from_admin(&admin))
    }

    pub fn is_super(&self) -> bool {
        self.role == AdminRole::Super
    }

    pub fn require_super(&self) -> Result<()> {
        if self.is_super() {
            Ok(())
        } else {
            Err(AppError::forbidden("Only the super admin can do this"))
        }
    }

    /// Super admins see every branch; branch admins only their own.
    pub fn can_access_branch(&self, branch_name: &str) -> bool {
        match self.role {
            AdminRole::Super => true,
            AdminRole::BranchAdmin => self.branch_name.as_deref() == Some(branch_name),
        }
    }

    pub fn ensure_branch(&self, branch_name: &str, message: &str) -> Result<()> {
        if self.can_access_branch(branch_name) {
            Ok(())
        } else {
            Err(AppError::forbidden(message))
        }
    }

    /// Branch filter to apply to list queries (`None` means all branches).
    pub fn branch_scope(&self) -> Option<&str> {
        match self.role {
            AdminRole::Super => None,
            AdminRole::BranchAdmin => Some(self.branch_name.as_deref().unwrap_or_default()),
        }
    }
}

/// Global middleware: decode the session cookie, if any, into the context.
pub fn session_middleware(keys: TokenKeys) -> Middleware {
    Arc::new(move |ctx| {
        if let Some(token) = ctx.cookies.get(SESSION_COOKIE) {
            match keys.verify(token) {
                Ok(session) => ctx.session = Some(session),
                Err(e) => log::debug!("Ignoring invalid session cookie: {}", e),
            }
        }
        None
    })
}

/// Route middleware: reject requests without a session.
pub fn auth_required() -> Middleware {
    Arc::new(|ctx| {
        if ctx.session.is_some() {
            None
        } else {
            Some(Response::json(
                json!({ "success": false, "message": "Not authorized, please log in" }),
                401,
                HashMap::new(),
            ))
        }
    })
}
