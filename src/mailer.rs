//! Outgoing email (OTP codes, password reset links).
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::error::{AppError, Result};
use crate::settings::SmtpSettings;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;
}

/// SMTP delivery over a STARTTLS relay.
pub struct SmtpMailer {
    settings: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        SmtpMailer { settings }
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<()> {
        let settings = self.settings.clone();
        let to = email.to.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let message = Message::builder()
                .from(
                    settings
                        .from
                        .parse()
                        .map_err(|e| AppError::Mail(format!("From parse error: {}", e)))?,
                )
                .to(email
                    .to
                    .parse()
                    .map_err(|_| AppError::validation("Invalid email address"))?)
                .subject(email.subject)
                .multipart(lettre::message::MultiPart::alternative_plain_html(
                    email.text, email.html,
                ))
                .map_err(|e| AppError::Mail(format!("Message build error: {}", e)))?;

            let creds = Credentials::new(settings.user.clone(), settings.password.clone());
            let mailer = SmtpTransport::starttls_relay(&settings.host)
                .map_err(|e| AppError::Mail(format!("SMTP relay error: {}", e)))?
                .port(settings.port)
                .credentials(creds)
                .build();
            mailer
                .send(&message)
                .map_err(|e| AppError::Mail(format!("SMTP send error: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Mail(format!("Mail task failed: {}", e)))??;
        log::info!("Mail sent to {}", to);
        Ok(())
    }
}

/// Used when SMTP is not configured: every send fails.
pub struct UnconfiguredMailer;

#[async_trait::async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send(&self, email: Email) -> Result<()> {
        Err(AppError::Mail(format!(
            "SMTP is not configured, cannot mail {}",
            email.to
        )))
    }
}

/// One-time code email.
pub fn otp_email(to: &str, otp: &str, ttl_minutes: i64) -> Email {
    Email {
        to: to.to_string(),
        subject: "Your verification code".to_string(),
        text: format!(
            "Hi, your code is: {}. It will expire in {} minutes.",
            otp, ttl_minutes
        ),
        html: format!(
            "<div style=\"font-family: Arial, sans-serif; font-size: 14px; color: #333;\">\
             <p>Hi <b>{to}</b>,</p>\
             <p>Your code is: <b style=\"font-size: 18px;\">{otp}</b></p>\
             <p>This code will expire in {ttl_minutes} minutes.</p>\
             <p>If you didn't expect this message, feel free to disregard it.</p></div>"
        ),
    }
}

pub fn reset_email(to: &str, link: &str, ttl_minutes: i64) -> Email {
    Email {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        text: format!(
            "Use this link to reset your password: {} (valid for {} minutes).",
            link, ttl_minutes
        ),
        html: format!(
            "<div style=\"font-family: Arial, sans-serif; font-size: 14px; color: #333;\">\
             <p>Click <a href=\"{link}\">here</a> to reset your password.</p>\
             <p>The link is valid for {ttl_minutes} minutes.</p></div>"
        ),
    }
}
