//! Email copies of stored notifications.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::core::config::EmailSettings;
use crate::db::models::User;

#[derive(Debug, Error)]
pub(crate) enum MailError {
    #[error("invalid email address: {0}")]
    Address(String),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub(crate) trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

pub(crate) struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// `None` when no SMTP host is configured.
    pub(crate) fn from_settings(settings: &EmailSettings) -> Result<Option<Self>, MailError> {
        let Some(host) = settings.smtp_host.as_deref() else {
            return Ok(None);
        };

        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        let mut builder = builder.port(settings.smtp_port);
        if !settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }

        let from = parse_mailbox(&settings.from)?;
        Ok(Some(Self { transport: builder.build(), from }))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse::<Mailbox>().map_err(|_| MailError::Address(address.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Mails `user` a copy of a notification. Returns whether a message went
/// out; users without an address are skipped and failures only logged.
pub(crate) async fn deliver(mailer: &dyn Mailer, user: &User, subject: &str, body: &str) -> bool {
    let Some(address) = user.email.as_deref().map(str::trim).filter(|email| !email.is_empty())
    else {
        tracing::debug!(login = %user.login, "No email address; notification not mailed");
        return false;
    };

    match mailer.send(address, subject, body).await {
        Ok(()) => {
            tracing::debug!(login = %user.login, "Notification mailed");
            true
        }
        Err(error) => {
            tracing::warn!(login = %user.login, error = %error, "Failed to mail notification");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, RecordingMailer};

    #[tokio::test]
    async fn users_without_an_address_are_skipped() {
        let mailer = RecordingMailer::new();
        let mut user = test_support::user_row("u1", "student", false);
        user.email = Some("  ".to_string());

        assert!(!deliver(&mailer, &user, "Subject", "Body").await);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_is_not_an_error() {
        let mailer = RecordingMailer::failing();
        let mut user = test_support::user_row("u1", "student", false);
        user.email = Some("student@example.com".to_string());

        assert!(!deliver(&mailer, &user, "Subject", "Body").await);
    }

    #[test]
    fn no_host_means_no_mailer() {
        let settings = EmailSettings {
            smtp_host: None,
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from: "noreply@example.com".to_string(),
            starttls: true,
        };
        assert!(SmtpMailer::from_settings(&settings).expect("settings").is_none());
    }

    #[test]
    fn bad_sender_address_is_rejected() {
        let settings = EmailSettings {
            smtp_host: Some("localhost".to_string()),
            smtp_port: 25,
            username: String::new(),
            password: String::new(),
            from: "not an address".to_string(),
            starttls: false,
        };
        assert!(matches!(SmtpMailer::from_settings(&settings), Err(MailError::Address(_))));
    }
}
