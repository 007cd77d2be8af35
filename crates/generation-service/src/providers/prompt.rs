//! Prompt enhancement client
//!
//! Turns a raw user prompt into a richer, English image-generation prompt via
//! a chat-completion provider. There is no fallback at this stage: a provider
//! failure surfaces as an AI service error and aborts the generation.

use aigen_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::Selection;
use crate::config::ProviderConfig;

const PROMPT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_OUTPUT_TOKENS: u32 = 200;
const TEMPERATURE: f32 = 0.7;

pub struct PromptClient {
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl Default for PromptClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Enhance a raw prompt using the selected provider
    pub async fn enhance(&self, selection: &Selection, prompt: &str, style: &str) -> Result<String> {
        match selection {
            Selection::Mock => Ok(Self::mock_enhance(prompt, style)),
            Selection::Provider(provider) => self.enhance_remote(provider, prompt).await,
        }
    }

    /// Deterministic template used when no prompt provider is configured
    pub fn mock_enhance(prompt: &str, style: &str) -> String {
        format!("A beautiful {prompt}, detailed digital art, high quality, {style} style")
    }

    async fn enhance_remote(&self, provider: &ProviderConfig, prompt: &str) -> Result<String> {
        let api_key = provider.api_key.as_deref().ok_or_else(|| {
            Error::AiService(format!("provider {} has no API key", provider.name))
        })?;

        let instruction = format!(
            "Rewrite the following description as one detailed English prompt for an \
             image generation model. Include style, colour and composition cues. \
             Output only the prompt itself, with no explanation.\n\nDescription: {prompt}"
        );

        let request = ChatRequest {
            model: &provider.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &instruction,
            }],
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
        };

        let url = format!("{}/chat/completions", provider.base_url);
        debug!("Requesting prompt enhancement from {}", provider.name);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(PROMPT_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::AiService(format!("{} request failed: {e}", provider.name)))?;

        if !response.status().is_success() {
            return Err(Error::AiService(format!(
                "{} returned status {}",
                provider.name,
                response.status()
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            Error::AiService(format!("{} returned malformed response: {e}", provider.name))
        })?;

        let text = body
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                Error::AiService(format!("{} returned no completion", provider.name))
            })?;

        info!("Prompt enhanced by {}", provider.name);
        Ok(text)
    }
}
