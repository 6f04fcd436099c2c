//! Messaging transport types and the outbound `Messenger` seam.
//!
//! Transports are pure I/O — no business logic. Inbound delivery may be
//! retried by the provider; idempotency is handled downstream (two-phase
//! booking commit), not by deduplicating transport events.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Unified inbound message from the transport webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender identity (phone number, no transport prefix).
    pub sender: String,
    pub text: String,
    pub attachment_url: Option<String>,
}

/// Outbound message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub body: String,
    pub media_url: Option<String>,
}

/// Outbound messaging seam. Delivery success is not observed by the core;
/// send failures are logged by callers and never fail the flow.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError>;
}

/// Messenger that records messages instead of sending them. Used in tests
/// and when transport credentials are absent.
#[derive(Default)]
pub struct SimulatedMessenger {
    sent: tokio::sync::Mutex<Vec<OutboundMessage>>,
}

impl SimulatedMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything "sent" so far, in order.
    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Messenger for SimulatedMessenger {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        tracing::info!(to = %message.to, "[simulation] {}", message.body);
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_messenger_records_sends() {
        let messenger = SimulatedMessenger::new();
        messenger
            .send(&OutboundMessage {
                to: "+254700000001".into(),
                body: "hello".into(),
                media_url: None,
            })
            .await
            .unwrap();

        let sent = messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "hello");
    }
}
