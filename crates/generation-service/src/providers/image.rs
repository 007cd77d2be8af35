//! Image generation client with mock fallback
//!
//! The mock path simulates provider latency and returns a pseudo-random stock
//! photo URL. Real-provider failures never propagate: the call downgrades to
//! the mock path and reports "mock" as the provider used.

use aigen_common::{Error, Result};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use super::{Selection, MOCK_PROVIDER};
use crate::config::ProviderConfig;

const IMAGE_TIMEOUT: Duration = Duration::from_secs(120);
const IMAGE_SIZE: &str = "1024x1024";

/// A generated image plus the provider that actually produced it
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Direct URL or a `data:` URI
    pub url: String,

    /// Provider name; "mock" after a silent fallback
    pub provider: String,
}

pub struct ImageClient {
    client: reqwest::Client,
    mock_latency: Duration,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    n: u32,
    quality: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

impl ImageClient {
    pub fn new(mock_latency: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            mock_latency,
        }
    }

    /// Generate one square image for the enhanced prompt
    ///
    /// Infallible by design: any real-provider failure is logged and answered
    /// with a mock image instead.
    pub async fn generate(&self, selection: &Selection, enhanced_prompt: &str) -> GeneratedImage {
        match selection {
            Selection::Mock => self.mock_generate().await,
            Selection::Provider(provider) => {
                match self.generate_remote(provider, enhanced_prompt).await {
                    Ok(url) => {
                        info!("Image generated by {}", provider.name);
                        GeneratedImage {
                            url,
                            provider: provider.name.clone(),
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} image generation failed, falling back to mock: {e}",
                            provider.name
                        );
                        self.mock_generate().await
                    }
                }
            }
        }
    }

    async fn mock_generate(&self) -> GeneratedImage {
        tokio::time::sleep(self.mock_latency).await;

        // Random seed plus timestamp so repeated calls never collide.
        let seed: u32 = rand::thread_rng().gen_range(0..1000);
        let url = format!(
            "https://picsum.photos/1024/1024?random={seed}&t={}",
            Utc::now().timestamp_millis()
        );

        GeneratedImage {
            url,
            provider: MOCK_PROVIDER.to_string(),
        }
    }

    async fn generate_remote(&self, provider: &ProviderConfig, prompt: &str) -> Result<String> {
        let api_key = provider.api_key.as_deref().ok_or_else(|| {
            Error::AiService(format!("provider {} has no API key", provider.name))
        })?;

        let request = ImageRequest {
            model: &provider.model,
            prompt,
            size: IMAGE_SIZE,
            n: 1,
            quality: "standard",
            response_format: "url",
        };

        let url = format!("{}/images/generations", provider.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(IMAGE_TIMEOUT)
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

        let body: ImageResponse = response.json().await.map_err(|e| {
            Error::AiService(format!("{} returned malformed response: {e}", provider.name))
        })?;

        let image = body.data.into_iter().next().ok_or_else(|| {
            Error::AiService(format!("{} returned no image data", provider.name))
        })?;

        if let Some(url) = image.url {
            Ok(url)
        } else if let Some(b64) = image.b64_json {
            Ok(format!("data:image/png;base64,{b64}"))
        } else {
            Err(Error::AiService(format!(
                "{} returned neither a URL nor base64 data",
                provider.name
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> ImageClient {
        ImageClient::new(Duration::from_millis(0))
    }

    #[tokio::test]
    async fn test_mock_generation_url_shape() {
        let image = test_client().generate(&Selection::Mock, "a cat").await;

        assert_eq!(image.provider, MOCK_PROVIDER);
        assert!(image.url.starts_with("https://picsum.photos/1024/1024?random="));
        assert!(image.url.contains("&t="));
    }

    #[tokio::test]
    async fn test_mock_generation_urls_are_distinct() {
        let client = test_client();
        let first = client.generate(&Selection::Mock, "a cat").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = client.generate(&Selection::Mock, "a cat").await;

        assert_ne!(first.url, second.url);
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_mock() {
        let provider = ProviderConfig {
            name: "zhipu".to_string(),
            api_key: Some("key".to_string()),
            // Nothing listens here; the request fails fast.
            base_url: "http://127.0.0.1:9".to_string(),
            model: "cogview-3".to_string(),
            priority: Some(1),
        };

        let image = test_client()
            .generate(&Selection::Provider(provider), "a cat")
            .await;

        assert_eq!(image.provider, MOCK_PROVIDER);
        assert!(image.url.starts_with("https://picsum.photos/"));
    }
}
