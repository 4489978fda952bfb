//! One-time codes for email confirmation and password reset tokens.
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

pub const OTP_TTL_MINUTES: i64 = 3;
pub const RESET_TTL_MINUTES: i64 = 15;

/// Random 6-digit code.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

pub fn otp_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(OTP_TTL_MINUTES)
}

/// Random URL-safe reset token (64 hex chars).
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn reset_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(RESET_TTL_MINUTES)
}

/// Reset tokens are only stored hashed.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
