//! WhatsApp transport via the Twilio Messages API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::transport::{Messenger, OutboundMessage};
use crate::error::ChannelError;

/// WhatsApp channel — posts to the Twilio Messages endpoint.
pub struct WhatsAppTransport {
    account_sid: String,
    auth_token: SecretString,
    /// Sender number, including the `whatsapp:` prefix.
    from_number: String,
    client: reqwest::Client,
    api_base: String,
}

impl WhatsAppTransport {
    pub fn new(account_sid: String, auth_token: SecretString, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client: reqwest::Client::new(),
            api_base: "https://api.twilio.com".to_string(),
        }
    }

    /// Account SIDs are prefixed "AC"; reject obviously bad configuration
    /// early instead of failing on the first send.
    pub fn validate(&self) -> Result<(), ChannelError> {
        if !self.account_sid.starts_with("AC") {
            return Err(ChannelError::InvalidMessage(
                "Twilio account SID must start with 'AC'".into(),
            ));
        }
        Ok(())
    }

    fn api_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }

    /// Prefix an identity for the WhatsApp channel.
    fn whatsapp_addr(identity: &str) -> String {
        if identity.starts_with("whatsapp:") {
            identity.to_string()
        } else {
            format!("whatsapp:{identity}")
        }
    }
}

#[async_trait]
impl Messenger for WhatsAppTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        let mut form = vec![
            ("To", Self::whatsapp_addr(&message.to)),
            ("From", self.from_number.clone()),
            ("Body", message.body.clone()),
        ];
        if let Some(media) = &message.media_url {
            form.push(("MediaUrl", media.clone()));
        }

        let resp = self
            .client
            .post(self.api_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                to: message.to.clone(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                to: message.to.clone(),
                reason: format!("Twilio returned {status}: {body}"),
            });
        }

        tracing::debug!(to = %message.to, "WhatsApp message sent");
        Ok(())
    }
}

/// Strip the transport prefix from an inbound sender address.
pub fn strip_whatsapp_prefix(from: &str) -> &str {
    from.strip_prefix("whatsapp:").unwrap_or(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix() {
        assert_eq!(strip_whatsapp_prefix("whatsapp:+254700000001"), "+254700000001");
        assert_eq!(strip_whatsapp_prefix("+254700000001"), "+254700000001");
    }

    #[test]
    fn validates_account_sid_format() {
        let good = WhatsAppTransport::new(
            "AC123".into(),
            SecretString::from("token"),
            "whatsapp:+14155238886".into(),
        );
        assert!(good.validate().is_ok());

        let bad = WhatsAppTransport::new(
            "XX123".into(),
            SecretString::from("token"),
            "whatsapp:+14155238886".into(),
        );
        assert!(bad.validate().is_err());
    }

    #[test]
    fn whatsapp_addr_is_idempotent() {
        assert_eq!(
            WhatsAppTransport::whatsapp_addr("whatsapp:+1"),
            "whatsapp:+1"
        );
        assert_eq!(WhatsAppTransport::whatsapp_addr("+1"), "whatsapp:+1");
    }
}
