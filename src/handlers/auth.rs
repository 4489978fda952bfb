//! Login, logout, super admin registration, OTP and password reset.
use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::{field, loose_string, ok, require};
use crate::auth::otp::{
    OTP_TTL_MINUTES, RESET_TTL_MINUTES, generate_otp, generate_reset_token, hash_token,
    otp_expiry, reset_expiry,
};
use crate::auth::password::PasswordManager;
use crate::auth::token::TokenKeys;
use crate::auth::{Session, SessionKind};
use crate::error::{AppError, Result};
use crate::mailer::{otp_email, reset_email};
use crate::models::admin::{Admin, AdminRole};
use crate::models::student::Student;
use crate::router::{Request, Response};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub mobile: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub password: Option<String>,
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid mobile number or password".to_string())
}

fn start_session(
    state: &AppState,
    session: Session,
    body: serde_json::Value,
) -> Result<Response> {
    let token = state.tokens.issue(&session)?;
    let cookie = state.tokens.session_cookie(&token, !state.settings.debug);
    Ok(Response::json(body, 200, HashMap::new()).with_header("Set-Cookie", cookie))
}

/// `POST /login`: admins are matched first, then students.
pub async fn login(req: Request, state: AppState) -> Result<Response> {
    let body: LoginRequest = req.decode()?;
    require(&[("mobile", &body.mobile), ("password", &body.password)])?;
    let mobile = field("mobile", &body.mobile)?;
    let password = field("password", &body.password)?;

    if let Some(admin) = Admin::find_by_mobile(&state.db, &mobile).await? {
        if !PasswordManager::verify_password(&password, &admin.password_hash)? {
            return Err(invalid_credentials());
        }
        if !admin.is_verified {
            return Err(AppError::forbidden("Please verify your account first"));
        }
        log::info!("Admin `{}` logged in", admin.email);
        let session = Session {
            subject_id: admin.id.clone(),
            kind: SessionKind::Admin,
        };
        return start_session(
            &state,
            session,
            json!({
                "success": true,
                "message": "Login successful",
                "kind": SessionKind::Admin,
                "role": admin.role,
                "data": admin,
            }),
        );
    }

    if let Some(student) = Student::find_by_mobile(&state.db, &mobile).await? {
        let Some(hash) = student.password_hash.as_deref() else {
            return Err(invalid_credentials());
        };
        if !PasswordManager::verify_password(&password, hash)? {
            return Err(invalid_credentials());
        }
        if !student.active_status {
            return Err(AppError::forbidden(
                "Your account is inactive, please contact your branch",
            ));
        }
        log::info!("Student `{}` logged in", student.user_id);
        let session = Session {
            subject_id: student.id.clone(),
            kind: SessionKind::Student,
        };
        return start_session(
            &state,
            session,
            json!({
                "success": true,
                "message": "Login successful",
                "kind": SessionKind::Student,
                "role": student.role,
                "data": student,
            }),
        );
    }

    Err(invalid_credentials())
}

/// `POST /logout`
pub async fn logout(_req: Request, _state: AppState) -> Result<Response> {
    Ok(ok("Logged out successfully").with_header("Set-Cookie", TokenKeys::clear_cookie()))
}

/// `GET /get-user-details`: whoever the session belongs to.
pub async fn user_details(req: Request, state: AppState) -> Result<Response> {
    let session = req
        .session
        .as_ref()
        .ok_or_else(|| AppError::Unauthorized("Not authorized, please log in".to_string()))?;
    let body = match session.kind {
        SessionKind::Admin => {
            let admin = Admin::find_by_id(&state.db, &session.subject_id)
                .await?
                .ok_or_else(|| AppError::not_found("User not found"))?;
            json!({ "success": true, "kind": session.kind, "data": admin })
        }
        SessionKind::Student => {
            let student = Student::find_by_id(&state.db, &session.subject_id)
                .await?
                .ok_or_else(|| AppError::not_found("User not found"))?;
            json!({ "success": true, "kind": session.kind, "data": student })
        }
    };
    Ok(Response::json(body, 200, HashMap::new()))
}

#[derive(Deserialize)]
pub struct RegisterAdmin {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub mobile: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

async fn send_otp(state: &AppState, admin: &mut Admin) -> Result<()> {
    let otp = generate_otp();
    admin.otp = Some(hash_token(&otp));
    admin.otp_expires_at = Some(otp_expiry(Utc::now()));
    admin.save(&state.db).await?;
    state
        .mailer
        .send(otp_email(&admin.email, &otp, OTP_TTL_MINUTES))
        .await
}

/// `POST /register`: one-time registration of the super admin.
pub async fn register(req: Request, state: AppState) -> Result<Response> {
    let body: RegisterAdmin = req.decode()?;
    require(&[
        ("name", &body.name),
        ("email", &body.email),
        ("mobile", &body.mobile),
        ("password", &body.password),
    ])?;
    let password = field("password", &body.password)?;
    PasswordManager::check_strength(&password)?;

    if Admin::super_exists(&state.db).await? {
        return Err(AppError::forbidden("A super admin is already registered"));
    }
    let mobile = field("mobile", &body.mobile)?;
    if Student::find_by_mobile(&state.db, &mobile).await?.is_some() {
        return Err(AppError::validation(
            "Mobile is already registered as a student",
        ));
    }

    let mut admin = Admin::new(
        field("name", &body.name)?,
        field("email", &body.email)?.to_lowercase(),
        mobile,
        PasswordManager::hash_password(&password)?,
        AdminRole::Super,
    );
    admin.insert(&state.db).await?;
    // the account stays; only a fresh code via /resend-otp can verify it now
    if let Err(e) = send_otp(&state, &mut admin).await {
        log::warn!(
            "Super admin {} registered but the OTP mail failed: {}",
            admin.email,
            e
        );
        return Ok(Response::json(
            json!({
                "success": false,
                "message": "Registered, but the OTP email could not be sent. \
                            Request a new code with /resend-otp",
            }),
            500,
            HashMap::new(),
        ));
    }

    Ok(ok("Registered successfully, please verify the OTP sent to your email"))
}

#[derive(Deserialize)]
pub struct OtpRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub otp: Option<String>,
}

async fn admin_by_email(state: &AppState, email: &Option<String>) -> Result<Admin> {
    let email = field("email", email)?.to_lowercase();
    Admin::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// `POST /verifyOtp`
pub async fn verify_otp(req: Request, state: AppState) -> Result<Response> {
    let body: OtpRequest = req.decode()?;
    require(&[("email", &body.email), ("otp", &body.otp)])?;
    let mut admin = admin_by_email(&state, &body.email).await?;
    if admin.is_verified {
        return Ok(ok("Account is already verified"));
    }

    let (Some(stored), Some(expires_at)) = (admin.otp.as_deref(), admin.otp_expires_at) else {
        return Err(AppError::validation("No OTP pending, please request a new one"));
    };
    if expires_at < Utc::now() {
        return Err(AppError::validation("OTP has expired, please request a new one"));
    }
    if stored != hash_token(&field("otp", &body.otp)?) {
        return Err(AppError::validation("Invalid OTP"));
    }

    admin.is_verified = true;
    admin.otp = None;
    admin.otp_expires_at = None;
    admin.save(&state.db).await?;
    log::info!("Admin `{}` verified", admin.email);
    Ok(ok("Account verified successfully"))
}

/// `POST /resend-otp`
pub async fn resend_otp(req: Request, state: AppState) -> Result<Response> {
    let body: OtpRequest = req.decode()?;
    let mut admin = admin_by_email(&state, &body.email).await?;
    if admin.is_verified {
        return Err(AppError::validation("Account is already verified"));
    }
    send_otp(&state, &mut admin).await?;
    Ok(ok("A new OTP has been sent to your email"))
}

#[derive(Deserialize)]
pub struct ForgotPassword {
    #[serde(default)]
    pub email: Option<String>,
}

/// `POST /forgetPassword`: mail a single-use reset link.
pub async fn forget_password(req: Request, state: AppState) -> Result<Response> {
    let body: ForgotPassword = req.decode()?;
    let mut admin = admin_by_email(&state, &body.email).await?;

    let token = generate_reset_token();
    admin.reset_token_hash = Some(hash_token(&token));
    admin.reset_expires_at = Some(reset_expiry(Utc::now()));
    admin.save(&state.db).await?;

    let link = format!("{}/reset-password/{}", state.settings.public_url, token);
    state
        .mailer
        .send(reset_email(&admin.email, &link, RESET_TTL_MINUTES))
        .await?;
    Ok(ok("Password reset link has been sent to your email"))
}

#[derive(Deserialize)]
pub struct ResetPassword {
    #[serde(default)]
    pub password: Option<String>,
}

/// `POST /resetPassword/:token`
pub async fn reset_password(req: Request, state: AppState) -> Result<Response> {
    let token = req.param("token")?.to_string();
    let body: ResetPassword = req.decode()?;
    let password = field("password", &body.password)?;
    PasswordManager::check_strength(&password)?;

    let invalid = || AppError::validation("Reset link is invalid or has expired");
    let mut admin = Admin::find_by_reset_hash(&state.db, &hash_token(&token))
        .await?
        .ok_or_else(invalid)?;
    if admin.reset_expires_at.is_none_or(|at| at < Utc::now()) {
        return Err(invalid());
    }

    admin.password_hash = PasswordManager::hash_password(&password)?;
    admin.reset_token_hash = None;
    admin.reset_expires_at = None;
    admin.save(&state.db).await?;
    log::info!("Password reset for `{}`", admin.email);
    Ok(ok("Password has been reset successfully"))
}
