//! Advisory gateway — optional AI free-text health advice.
//!
//! Supports:
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//!
//! The gateway is an explicit optional boundary: `advise` returns
//! `Ok(None)` when the backend is unavailable or produced nothing, and the
//! caller substitutes the fixed default menu prompt. Advice never blocks
//! the booking flow; the dispatcher bounds every call with a timeout.

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use secrecy::ExposeSecret;

use crate::error::AdvisoryError;

const SYSTEM_PROMPT: &str = "\
You are a professional healthcare assistant for an on-demand home-care service.
Provide helpful, clear, and empathetic guidance. Keep responses under 200 words.
Always recommend booking a professional visit for serious symptoms.
IMPORTANT: Never provide a definitive medical diagnosis.";

/// Supported advisory backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryBackend {
    Anthropic,
    OpenAi,
}

/// Configuration for creating an advisory gateway.
#[derive(Debug, Clone)]
pub struct AdvisoryConfig {
    pub backend: AdvisoryBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Free-text health-advice collaborator.
///
/// `None` signals "unavailable" — callers fall back to the menu prompt.
#[async_trait]
pub trait AdvisoryGateway: Send + Sync {
    async fn advise(
        &self,
        user_text: &str,
        profile_summary: &str,
    ) -> Result<Option<String>, AdvisoryError>;
}

/// Gateway that is always unavailable (tests, no API key configured).
pub struct NoopAdvisory;

#[async_trait]
impl AdvisoryGateway for NoopAdvisory {
    async fn advise(
        &self,
        _user_text: &str,
        _profile_summary: &str,
    ) -> Result<Option<String>, AdvisoryError> {
        Ok(None)
    }
}

/// Create an advisory gateway from configuration.
pub fn create_gateway(config: &AdvisoryConfig) -> Result<Arc<dyn AdvisoryGateway>, AdvisoryError> {
    match config.backend {
        AdvisoryBackend::Anthropic => create_anthropic_gateway(config),
        AdvisoryBackend::OpenAi => create_openai_gateway(config),
    }
}

fn create_anthropic_gateway(
    config: &AdvisoryConfig,
) -> Result<Arc<dyn AdvisoryGateway>, AdvisoryError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            AdvisoryError::RequestFailed {
                backend: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {e}"),
            }
        })?;

    let agent = client.agent(&config.model).preamble(SYSTEM_PROMPT).build();
    tracing::info!("Advisory gateway: Anthropic (model: {})", config.model);
    Ok(Arc::new(RigGateway {
        agent,
        backend: "anthropic",
    }))
}

fn create_openai_gateway(
    config: &AdvisoryConfig,
) -> Result<Arc<dyn AdvisoryGateway>, AdvisoryError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            AdvisoryError::RequestFailed {
                backend: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {e}"),
            }
        })?;

    let agent = client.agent(&config.model).preamble(SYSTEM_PROMPT).build();
    tracing::info!("Advisory gateway: OpenAI (model: {})", config.model);
    Ok(Arc::new(RigGateway {
        agent,
        backend: "openai",
    }))
}

/// rig-backed gateway over any completion model.
struct RigGateway<M: rig::completion::CompletionModel> {
    agent: rig::agent::Agent<M>,
    backend: &'static str,
}

#[async_trait]
impl<M> AdvisoryGateway for RigGateway<M>
where
    M: rig::completion::CompletionModel + Send + Sync,
{
    async fn advise(
        &self,
        user_text: &str,
        profile_summary: &str,
    ) -> Result<Option<String>, AdvisoryError> {
        let prompt = format!(
            "User health context: {profile_summary}\n\n\
             User message: \"{user_text}\"\n\n\
             Provide personalized guidance based on their message and history."
        );

        match self.agent.prompt(prompt).await {
            Ok(text) if !text.trim().is_empty() => Ok(Some(text)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!(backend = self.backend, "Advisory request failed: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_gateway_is_unavailable() {
        let gateway = NoopAdvisory;
        let advice = gateway.advise("I have a headache", "no history").await.unwrap();
        assert!(advice.is_none());
    }

    #[tokio::test]
    async fn create_gateway_accepts_any_key_at_construction() {
        // rig-core clients accept any string as API key at construction
        // time; auth failures surface on the first request.
        let config = AdvisoryConfig {
            backend: AdvisoryBackend::Anthropic,
            api_key: secrecy::SecretString::from("test-key"),
            model: "claude-3-5-sonnet-latest".to_string(),
        };
        assert!(create_gateway(&config).is_ok());
    }

    #[tokio::test]
    async fn create_openai_gateway_constructs() {
        let config = AdvisoryConfig {
            backend: AdvisoryBackend::OpenAi,
            api_key: secrecy::SecretString::from("sk-test"),
            model: "gpt-4o".to_string(),
        };
        assert!(create_gateway(&config).is_ok());
    }
}
