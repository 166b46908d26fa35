//! # Notification Dispatcher
//!
//! Tells a customer they were called, through the entry's channel.
//!
//! ## Dispatch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Notification Dispatch                               │
//! │                                                                         │
//! │  call(E) committed                                                     │
//! │       │                                                                 │
//! │       ▼  (spawned, never awaited by the transition)                    │
//! │  Notification::for_call(E, config)                                     │
//! │       │                                                                 │
//! │       ├── Sms          { to_phone, body }                              │
//! │       ├── ChatTemplate { to_phone, template, language, parameters }    │
//! │       └── Email        { to, subject, body }                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  NotificationDispatcher::dispatch ──▶ channel registered for variant  │
//! │       │                                                                 │
//! │       ├── SmsGatewayChannel        (HTTP gateway, reqwest)             │
//! │       ├── WhatsAppTemplateChannel  (Cloud API, reqwest)                │
//! │       └── SmtpEmailChannel         (SMTP, lettre)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Err → logged. No fallback to another channel, no retry.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod email;
pub mod sms;
pub mod whatsapp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::NotifySettings;
use waitline_core::{ChannelKind, QueueConfiguration, QueueEntry};

pub use email::SmtpEmailChannel;
pub use sms::SmsGatewayChannel;
pub use whatsapp::WhatsAppTemplateChannel;

/// Chat template registered with the provider for "you were called".
pub const CALL_TEMPLATE: &str = "queue_called";

/// Language code of [`CALL_TEMPLATE`].
pub const CALL_TEMPLATE_LANGUAGE: &str = "en_US";

// =============================================================================
// Errors
// =============================================================================

/// Notification failures. Never propagated into a transition result.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The entry lacks the contact field its channel needs.
    #[error("{channel} notification needs a {field}")]
    MissingField {
        channel: ChannelKind,
        field: &'static str,
    },

    /// No channel is registered for the variant.
    #[error("No {0} channel configured")]
    ChannelNotConfigured(ChannelKind),

    /// A channel was handed a variant it does not send.
    #[error("{channel} channel cannot send a {variant} notification")]
    UnsupportedNotification {
        channel: ChannelKind,
        variant: ChannelKind,
    },

    /// Malformed phone number or mail address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Transport-level HTTP failure (DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The provider answered with a non-success status.
    #[error("{channel} provider returned {status}: {body}")]
    Rejected {
        channel: ChannelKind,
        status: u16,
        body: String,
    },

    /// SMTP failure.
    #[error("SMTP error: {0}")]
    Smtp(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Http(err.to_string())
    }
}

// =============================================================================
// Notification
// =============================================================================

/// One outbound message, shaped for exactly one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum Notification {
    Sms {
        to_phone: String,
        body: String,
    },
    ChatTemplate {
        to_phone: String,
        template: String,
        language: String,
        parameters: Vec<String>,
    },
    Email {
        to: String,
        subject: String,
        body: String,
    },
}

impl Notification {
    /// The channel this notification must go through.
    pub fn kind(&self) -> ChannelKind {
        match self {
            Notification::Sms { .. } => ChannelKind::Sms,
            Notification::ChatTemplate { .. } => ChannelKind::ChatTemplate,
            Notification::Email { .. } => ChannelKind::Email,
        }
    }

    /// Builds the "you were called" message for `entry`.
    ///
    /// Uses the entry's preferred channel, else the queue default. The
    /// tolerance quoted is the call-time snapshot when present.
    pub fn for_call(entry: &QueueEntry, config: &QueueConfiguration) -> Result<Self, NotifyError> {
        let channel = entry.channel(config);
        let minutes = entry
            .call_tolerance_minutes
            .unwrap_or(config.tolerance_minutes);
        let text = format!(
            "{}, it's your turn at {}. Please confirm within {} minutes.",
            entry.display_name, config.name, minutes
        );

        let phone = || {
            entry
                .phone
                .clone()
                .ok_or(NotifyError::MissingField { channel, field: "phone" })
        };

        match channel {
            ChannelKind::Sms => Ok(Notification::Sms {
                to_phone: phone()?,
                body: text,
            }),
            ChannelKind::ChatTemplate => Ok(Notification::ChatTemplate {
                to_phone: phone()?,
                template: CALL_TEMPLATE.to_string(),
                language: CALL_TEMPLATE_LANGUAGE.to_string(),
                parameters: vec![entry.display_name.clone(), config.name.clone(), minutes.to_string()],
            }),
            ChannelKind::Email => Ok(Notification::Email {
                to: entry
                    .email
                    .clone()
                    .ok_or(NotifyError::MissingField { channel, field: "email" })?,
                subject: format!("It's your turn at {}", config.name),
                body: text,
            }),
        }
    }
}

// =============================================================================
// Channel Trait
// =============================================================================

/// One outbound channel with its own failure mode.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// The variant this channel sends.
    fn kind(&self) -> ChannelKind;

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Routes each notification to the channel registered for its variant.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    channels: HashMap<ChannelKind, Arc<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher with no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the channels present in `settings`.
    pub fn from_settings(settings: &NotifySettings) -> Result<Self, NotifyError> {
        let mut dispatcher = Self::new();

        if let Some(sms) = &settings.sms {
            dispatcher.register(Arc::new(SmsGatewayChannel::new(sms.clone())?));
        }
        if let Some(whatsapp) = &settings.whatsapp {
            dispatcher.register(Arc::new(WhatsAppTemplateChannel::new(whatsapp.clone())?));
        }
        if let Some(email) = &settings.email {
            dispatcher.register(Arc::new(SmtpEmailChannel::new(email.clone())?));
        }

        info!(channels = ?dispatcher.registered(), "Notification channels registered");
        Ok(dispatcher)
    }

    /// Registers `channel`, replacing any channel of the same kind.
    pub fn register(&mut self, channel: Arc<dyn NotificationChannel>) {
        self.channels.insert(channel.kind(), channel);
    }

    /// Returns true if a channel of `kind` is registered.
    pub fn has_channel(&self, kind: ChannelKind) -> bool {
        self.channels.contains_key(&kind)
    }

    /// Registered channel kinds.
    pub fn registered(&self) -> Vec<ChannelKind> {
        self.channels.keys().copied().collect()
    }

    /// Sends `notification` through its channel.
    pub async fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError> {
        let kind = notification.kind();
        let channel = self
            .channels
            .get(&kind)
            .ok_or(NotifyError::ChannelNotConfigured(kind))?;

        channel.send(notification).await?;
        debug!(channel = %kind, "Notification sent");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use std::sync::Mutex;
    use waitline_core::EntryState;

    fn config(default_channel: ChannelKind) -> QueueConfiguration {
        QueueConfiguration {
            company_id: "acme".into(),
            queue_id: "front-desk".into(),
            name: "Front desk".into(),
            tolerance_minutes: 10,
            min_party_size: 1,
            max_party_size: 6,
            active_from: None,
            active_until: None,
            is_active: true,
            default_channel,
            average_service_minutes: 5,
            updated_at: Utc::now(),
        }
    }

    fn entry(phone: Option<&str>, email: Option<&str>) -> QueueEntry {
        let now = Utc::now();
        QueueEntry {
            id: "e-1".into(),
            seq: 1,
            company_id: "acme".into(),
            queue_id: "front-desk".into(),
            movement_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            customer_id: "c-1".into(),
            display_name: "Ada".into(),
            phone: phone.map(str::to_string),
            email: email.map(str::to_string),
            preferred_channel: None,
            party_size: 2,
            state: EntryState::Called,
            entered_at: now,
            called_at: Some(now),
            confirmed_at: None,
            attended_at: None,
            left_at: None,
            call_tolerance_minutes: Some(12),
        }
    }

    #[test]
    fn test_for_call_uses_queue_default_and_snapshot() {
        let n = Notification::for_call(&entry(Some("+5511999990000"), None), &config(ChannelKind::Sms))
            .unwrap();
        match n {
            Notification::Sms { to_phone, body } => {
                assert_eq!(to_phone, "+5511999990000");
                assert!(body.contains("Front desk"));
                assert!(body.contains("12 minutes"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_for_call_prefers_entry_channel() {
        let mut e = entry(Some("+5511999990000"), Some("ada@example.com"));
        e.preferred_channel = Some(ChannelKind::Email);

        let n = Notification::for_call(&e, &config(ChannelKind::Sms)).unwrap();
        assert_eq!(n.kind(), ChannelKind::Email);
    }

    #[test]
    fn test_for_call_template_parameters() {
        let n = Notification::for_call(
            &entry(Some("+5511999990000"), None),
            &config(ChannelKind::ChatTemplate),
        )
        .unwrap();
        assert_eq!(
            n,
            Notification::ChatTemplate {
                to_phone: "+5511999990000".into(),
                template: CALL_TEMPLATE.into(),
                language: CALL_TEMPLATE_LANGUAGE.into(),
                parameters: vec!["Ada".into(), "Front desk".into(), "12".into()],
            }
        );
    }

    #[test]
    fn test_for_call_missing_contact() {
        let err = Notification::for_call(&entry(None, None), &config(ChannelKind::Email)).unwrap_err();
        assert!(matches!(
            err,
            NotifyError::MissingField { channel: ChannelKind::Email, field: "email" }
        ));
    }

    struct Recording {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationChannel for Recording {
        fn kind(&self) -> ChannelKind {
            ChannelKind::Sms
        }

        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_variant() {
        let recording = Arc::new(Recording {
            sent: Mutex::new(Vec::new()),
        });
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.register(recording.clone());
        assert!(dispatcher.has_channel(ChannelKind::Sms));

        let sms = Notification::Sms {
            to_phone: "+5511999990000".into(),
            body: "hi".into(),
        };
        dispatcher.dispatch(&sms).await.unwrap();
        assert_eq!(recording.sent.lock().unwrap().len(), 1);

        let email = Notification::Email {
            to: "ada@example.com".into(),
            subject: "s".into(),
            body: "b".into(),
        };
        let err = dispatcher.dispatch(&email).await.unwrap_err();
        assert!(matches!(err, NotifyError::ChannelNotConfigured(ChannelKind::Email)));
    }
}
