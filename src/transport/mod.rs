//! Message transport seam.
//!
//! The dispatch engine is transport-agnostic: it hands each selected
//! recipient and the campaign payload to a [`MessageTransport`] and
//! records the outcome. A transport failure marks that recipient failed
//! for the run; it never aborts the run.

use async_trait::async_trait;

use crate::contacts::Recipient;

pub mod whatsapp;

pub use whatsapp::WhatsAppTransport;

/// The campaign message handed to a transport for every recipient.
#[derive(Debug, Clone)]
pub struct MessagePayload {
    /// Message text (or caption when media is attached).
    pub text: String,
    /// Optional media reference. Interpreted by the transport; the
    /// WhatsApp transport expects a hosted https link.
    pub media: Option<String>,
}

/// Errors surfaced by message transports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never reached the provider.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("send rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The transport is missing required credentials or wiring.
    #[error("transport not configured: {0}")]
    NotConfigured(String),
}

/// Message transport contract. New channels only need to implement this
/// trait.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Stable transport identifier (e.g. `whatsapp`).
    fn id(&self) -> &'static str;

    /// Deliver the campaign payload to one recipient.
    async fn send(
        &self,
        recipient: &Recipient,
        payload: &MessagePayload,
    ) -> Result<(), TransportError>;
}

/// Stand-in transport for runs that must never send, such as dry runs
/// without a configured channel. Every send attempt fails rather than
/// silently claiming delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTransport;

#[async_trait]
impl MessageTransport for UnconfiguredTransport {
    fn id(&self) -> &'static str {
        "unconfigured"
    }

    async fn send(
        &self,
        recipient: &Recipient,
        _payload: &MessagePayload,
    ) -> Result<(), TransportError> {
        Err(TransportError::NotConfigured(format!(
            "no message transport configured; cannot send to {recipient}"
        )))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn unconfigured_transport_refuses_to_send() {
        let transport = UnconfiguredTransport;
        let recipient = Recipient::normalize("+15550100").unwrap();
        let payload = MessagePayload {
            text: "hello".to_owned(),
            media: None,
        };
        let err = transport.send(&recipient, &payload).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConfigured(_)));
    }
}
