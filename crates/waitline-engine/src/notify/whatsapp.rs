//! WhatsApp Business Cloud API template messages.
//!
//! Business-initiated conversations must use a pre-approved template, so the
//! call notification is a template with positional body parameters.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{Notification, NotificationChannel, NotifyError};
use crate::config::WhatsAppSettings;
use waitline_core::ChannelKind;

/// Chat-template channel.
pub struct WhatsAppTemplateChannel {
    settings: WhatsAppSettings,
    client: reqwest::Client,
}

impl WhatsAppTemplateChannel {
    pub fn new(settings: WhatsAppSettings) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(WhatsAppTemplateChannel { settings, client })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.phone_number_id
        )
    }
}

/// Builds the Cloud API body for a template message.
///
/// The API wants the number without the leading `+`.
fn template_payload(
    to_phone: &str,
    template: &str,
    language: &str,
    parameters: &[String],
) -> serde_json::Value {
    let parameters: Vec<serde_json::Value> = parameters
        .iter()
        .map(|text| serde_json::json!({ "type": "text", "text": text }))
        .collect();

    serde_json::json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to_phone.trim_start_matches('+'),
        "type": "template",
        "template": {
            "name": template,
            "language": { "code": language },
            "components": [
                { "type": "body", "parameters": parameters }
            ]
        }
    })
}

#[async_trait]
impl NotificationChannel for WhatsAppTemplateChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::ChatTemplate
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let Notification::ChatTemplate {
            to_phone,
            template,
            language,
            parameters,
        } = notification
        else {
            return Err(NotifyError::UnsupportedNotification {
                channel: ChannelKind::ChatTemplate,
                variant: notification.kind(),
            });
        };

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.settings.access_token)
            .json(&template_payload(to_phone, template, language, parameters))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                channel: ChannelKind::ChatTemplate,
                status,
                body,
            });
        }

        // The send already succeeded; an unreadable body only loses the id.
        let message_id = sent_message_id(response.json().await.ok());

        debug!(to = %to_phone, message_id = %message_id, template = %template, "WhatsApp template sent");
        Ok(())
    }
}

/// Message id from a 2xx response body, `"unknown"` when absent.
fn sent_message_id(body: Option<serde_json::Value>) -> String {
    body.as_ref()
        .and_then(|result| result["messages"][0]["id"].as_str())
        .unwrap_or("unknown")
        .to_string()
}
