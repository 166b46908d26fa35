//! SMS through an HTTP gateway.
//!
//! The gateway receives `POST {endpoint}` with a JSON body
//! `{"to": "+55...", "from": "...", "body": "..."}` and a bearer token.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{Notification, NotificationChannel, NotifyError};
use crate::config::SmsSettings;
use waitline_core::ChannelKind;

/// Short-message channel.
pub struct SmsGatewayChannel {
    settings: SmsSettings,
    client: reqwest::Client,
}

impl SmsGatewayChannel {
    pub fn new(settings: SmsSettings) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(SmsGatewayChannel { settings, client })
    }

    fn payload(&self, to_phone: &str, body: &str) -> serde_json::Value {
        serde_json::json!({
            "to": to_phone,
            "from": self.settings.sender,
            "body": body,
        })
    }
}

#[async_trait]
impl NotificationChannel for SmsGatewayChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let Notification::Sms { to_phone, body } = notification else {
            return Err(NotifyError::UnsupportedNotification {
                channel: ChannelKind::Sms,
                variant: notification.kind(),
            });
        };

        let mut request = self
            .client
            .post(&self.settings.endpoint)
            .json(&self.payload(to_phone, body));
        if !self.settings.api_key.is_empty() {
            request = request.bearer_auth(&self.settings.api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                channel: ChannelKind::Sms,
                status,
                body,
            });
        }

        debug!(to = %to_phone, "SMS accepted by gateway");
        Ok(())
    }
}
