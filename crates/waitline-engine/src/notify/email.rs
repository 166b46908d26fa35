//! Electronic mail over SMTP (STARTTLS relay).

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{Notification, NotificationChannel, NotifyError};
use crate::config::EmailSettings;
use waitline_core::ChannelKind;

/// E-mail channel.
///
/// Must be constructed inside a Tokio runtime: the SMTP connection pool
/// runs on the Tokio executor.
pub struct SmtpEmailChannel {
    settings: EmailSettings,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailChannel {
    pub fn new(settings: EmailSettings) -> Result<Self, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
            .map_err(|e| NotifyError::Smtp(format!("SMTP relay: {e}")))?
            .port(settings.smtp_port);

        if !settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }

        Ok(SmtpEmailChannel {
            mailer: builder.build(),
            settings,
        })
    }
}

/// Builds the plain-text message.
fn build_message(
    settings: &EmailSettings,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, NotifyError> {
    let from = match &settings.from_name {
        Some(name) => format!("{name} <{}>", settings.from_address),
        None => settings.from_address.clone(),
    };

    let from: Mailbox = from
        .parse()
        .map_err(|e| NotifyError::InvalidAddress(format!("from: {e}")))?;
    let to: Mailbox = to
        .parse()
        .map_err(|e| NotifyError::InvalidAddress(format!("to: {e}")))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| NotifyError::Smtp(format!("Build email: {e}")))
}

#[async_trait]
impl NotificationChannel for SmtpEmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let Notification::Email { to, subject, body } = notification else {
            return Err(NotifyError::UnsupportedNotification {
                channel: ChannelKind::Email,
                variant: notification.kind(),
            });
        };

        let message = build_message(&self.settings, to, subject, body)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(format!("SMTP send: {e}")))?;

        debug!(to = %to, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EmailSettings {
        EmailSettings {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            username: "queue@example.com".into(),
            password: "secret".into(),
            from_address: "queue@example.com".into(),
            from_name: Some("Front desk".into()),
        }
    }

    #[test]
    fn test_build_message_headers() {
        let message = build_message(
            &settings(),
            "ada@example.com",
            "It's your turn at Front desk",
            "Ada, it's your turn.",
        )
        .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("ada@example.com"));
        assert!(raw.contains("Subject: "));
        assert!(raw.contains("<queue@example.com>"));
        assert!(raw.contains("Ada, it's your turn."));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let err = build_message(&settings(), "not-an-address", "s", "b").unwrap_err();
        assert!(matches!(err, NotifyError::InvalidAddress(_)));
    }
}
