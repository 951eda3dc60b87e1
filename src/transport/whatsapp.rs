//! WhatsApp Business Cloud API transport.
//!
//! Outbound-only: each send is one `POST {api_base}/{phone_number_id}/messages`
//! carrying either a text message or an image-by-link with the campaign
//! text as its caption.

use async_trait::async_trait;
use tracing::debug;

use super::{MessagePayload, MessageTransport, TransportError};
use crate::config::WhatsAppConfig;
use crate::contacts::Recipient;

/// Default Graph API base URL.
pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// WhatsApp Business Cloud API transport.
#[derive(Clone)]
pub struct WhatsAppTransport {
    access_token: String,
    phone_number_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl WhatsAppTransport {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            client: reqwest::Client::new(),
        }
    }

    fn message_body(recipient: &Recipient, payload: &MessagePayload) -> serde_json::Value {
        // The Graph API wants the number without the leading '+'.
        let to = recipient
            .as_str()
            .strip_prefix('+')
            .unwrap_or(recipient.as_str());
        match &payload.media {
            Some(link) => serde_json::json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": to,
                "type": "image",
                "image": {
                    "link": link,
                    "caption": payload.text
                }
            }),
            None => serde_json::json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": to,
                "type": "text",
                "text": {
                    "preview_url": false,
                    "body": payload.text
                }
            }),
        }
    }
}

#[async_trait]
impl MessageTransport for WhatsAppTransport {
    fn id(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(
        &self,
        recipient: &Recipient,
        payload: &MessagePayload,
    ) -> Result<(), TransportError> {
        if self.access_token.trim().is_empty() {
            return Err(TransportError::NotConfigured(
                "whatsapp access token is empty".to_owned(),
            ));
        }
        if self.phone_number_id.trim().is_empty() {
            return Err(TransportError::NotConfigured(
                "whatsapp phone_number_id is empty".to_owned(),
            ));
        }

        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let body = Self::message_body(recipient, payload);
        debug!(%recipient, url = %url, "posting whatsapp message");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected { status, body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn recipient() -> Recipient {
        Recipient::normalize("+15550100").unwrap()
    }

    #[test]
    fn text_body_strips_plus_prefix() {
        let payload = MessagePayload {
            text: "hello".to_owned(),
            media: None,
        };
        let body = WhatsAppTransport::message_body(&recipient(), &payload);
        assert_eq!(body["to"], "15550100");
        assert_eq!(body["type"], "text");
        assert_eq!(body["text"]["body"], "hello");
        assert_eq!(body["text"]["preview_url"], false);
    }

    #[test]
    fn media_payload_becomes_image_with_caption() {
        let payload = MessagePayload {
            text: "look at this".to_owned(),
            media: Some("https://example.com/flyer.png".to_owned()),
        };
        let body = WhatsAppTransport::message_body(&recipient(), &payload);
        assert_eq!(body["type"], "image");
        assert_eq!(body["image"]["link"], "https://example.com/flyer.png");
        assert_eq!(body["image"]["caption"], "look at this");
        assert!(body.get("text").is_none());
    }

    #[tokio::test]
    async fn empty_access_token_is_a_configuration_error() {
        let transport = WhatsAppTransport::new(&WhatsAppConfig {
            access_token: String::new(),
            phone_number_id: "123".to_owned(),
            api_base: DEFAULT_API_BASE.to_owned(),
        });
        let payload = MessagePayload {
            text: "hello".to_owned(),
            media: None,
        };
        let err = transport.send(&recipient(), &payload).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConfigured(_)));
    }
}
