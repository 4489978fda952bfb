use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Session, SessionKind};
use crate::error::{AppError, Result};

pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub kind: SessionKind,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, lifetime_days: i64) -> Self {
        TokenKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::days(lifetime_days),
        }
    }

    pub fn issue(&self, session: &Session) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: session.subject_id.clone(),
            kind: session.kind,
            exp: (now + self.lifetime).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Session> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(Session {
            subject_id: data.claims.sub,
            kind: data.claims.kind,
        })
    }

    /// `Set-Cookie` value carrying a freshly issued token.
    pub fn session_cookie(&self, token: &str, secure: bool) -> String {
        format!(
            "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite={}{}",
            SESSION_COOKIE,
            token,
            self.lifetime.num_seconds(),
            if secure { "None" } else { "Strict" },
            if secure { "; Secure" } else { "" }
        )
    }

    pub fn clear_cookie() -> String {
        format!("{}=; HttpOnly; Path=/; Max-Age=0", SESSION_COOKIE)
    }
}
