//! Messaging transport for inbound webhooks and outbound sends.

pub mod transport;
pub mod whatsapp;

pub use transport::{InboundMessage, Messenger, OutboundMessage, SimulatedMessenger};
pub use whatsapp::{WhatsAppTransport, strip_whatsapp_prefix};
