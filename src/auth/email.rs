//! # Email Integration
//!
//! Outgoing mail for the password reset flow. Without SMTP settings the
//! server records messages in memory instead of sending them.

use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Email delivery failure
#[derive(Debug, Clone, Error)]
#[error("email delivery failed: {0}")]
pub struct EmailError(pub String);

/// Email configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server host
    pub smtp_host: String,

    /// SMTP server port
    pub smtp_port: u16,

    /// SMTP username; empty means an unauthenticated local relay
    pub smtp_user: String,

    /// SMTP password (should come from secrets)
    pub smtp_password: String,

    /// From header, e.g. `Natours <hello@natours.io>`
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_user: String::new(),
            smtp_password: String::new(),
            from: "Tourbook <hello@tourbook.local>".to_string(),
        }
    }
}

/// Email template types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailTemplate {
    /// Password reset link, valid for ten minutes
    PasswordReset { to: String, reset_url: String },
}

impl EmailTemplate {
    /// Recipient, subject and plain-text body
    pub fn render(&self) -> (String, String, String) {
        match self {
            EmailTemplate::PasswordReset { to, reset_url } => {
                let subject = "Your password reset token (valid for 10 min)".to_string();
                let body = format!(
                    "Forgot your password? Submit a PATCH request with your new password \
                    and passwordConfirm to: {reset_url}.\n\
                    If you didn't forget your password, please ignore this email!"
                );
                (to.clone(), subject, body)
            }
        }
    }
}

/// Email sender trait for abstraction
pub trait EmailSender: Send + Sync {
    /// Send an email
    fn send(&self, template: EmailTemplate) -> Result<(), EmailError>;
}

/// In-memory sender used in development and tests
#[derive(Debug, Default)]
pub struct MockEmailSender {
    sent: RwLock<Vec<EmailTemplate>>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far
    pub fn sent(&self) -> Vec<EmailTemplate> {
        self.sent.read().map(|s| s.clone()).unwrap_or_default()
    }
}

impl EmailSender for MockEmailSender {
    fn send(&self, template: EmailTemplate) -> Result<(), EmailError> {
        tracing::info!(?template, "email captured by mock sender");
        self.sent
            .write()
            .map_err(|_| EmailError("mock mailbox poisoned".to_string()))?
            .push(template);
        Ok(())
    }
}

/// SMTP email sender
pub struct SmtpEmailSender {
    config: EmailConfig,
}

impl SmtpEmailSender {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

impl EmailSender for SmtpEmailSender {
    fn send(&self, template: EmailTemplate) -> Result<(), EmailError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials, Message,
            SmtpTransport, Transport,
        };

        let (to, subject, body) = template.render();

        let email = Message::builder()
            .from(
                self.config
                    .from
                    .parse()
                    .map_err(|e| EmailError(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| EmailError(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError(format!("Failed to build email: {e}")))?;

        let mailer = if self.config.smtp_user.is_empty() {
            // Local development relays (mailtrap, mailhog) without TLS or auth
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
                .port(self.config.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(
                self.config.smtp_user.clone(),
                self.config.smtp_password.clone(),
            );

            SmtpTransport::relay(&self.config.smtp_host)
                .map_err(|e| EmailError(format!("SMTP relay error: {e}")))?
                .credentials(creds)
                .port(self.config.smtp_port)
                .build()
        };

        mailer
            .send(&email)
            .map_err(|e| EmailError(format!("Failed to send email: {e}")))?;

        tracing::info!(to = %to, "email sent");
        Ok(())
    }
}

/// Create a shared email sender based on config
pub fn create_email_sender(config: Option<EmailConfig>) -> Arc<dyn EmailSender> {
    match config {
        Some(cfg) => Arc::new(SmtpEmailSender::new(cfg)),
        None => Arc::new(MockEmailSender::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_email_sender() {
        let sender = MockEmailSender::new();
        let template = EmailTemplate::PasswordReset {
            to: "test@example.com".to_string(),
            reset_url: "http://localhost/api/v1/users/resetPassword/abc".to_string(),
        };

        sender.send(template.clone()).unwrap();
        assert_eq!(sender.sent(), vec![template]);
    }

    #[test]
    fn test_reset_template_rendering() {
        let (to, subject, body) = EmailTemplate::PasswordReset {
            to: "user@example.com".to_string(),
            reset_url: "http://localhost/api/v1/users/resetPassword/abc123".to_string(),
        }
        .render();

        assert_eq!(to, "user@example.com");
        assert!(subject.contains("10 min"));
        assert!(body.contains("resetPassword/abc123"));
    }

    #[test]
    fn test_invalid_recipient_fails_before_connecting() {
        let sender = SmtpEmailSender::new(EmailConfig::default());
        let result = sender.send(EmailTemplate::PasswordReset {
            to: "not an address".to_string(),
            reset_url: "http://localhost".to_string(),
        });
        assert!(result.is_err());
    }
}
