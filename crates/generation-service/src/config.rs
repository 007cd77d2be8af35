//! Configuration management for the generation service
//!
//! Loads configuration from environment variables with sensible defaults.
//! A provider with no API key is simply disabled and the service degrades to
//! its mock path; missing credentials never abort startup.

use anyhow::{Context, Result};
use std::env;

/// Which document store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Redis,
}

/// One candidate upstream provider for a role
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Identifying provider name, e.g. "deepseek" or "zhipu"
    pub name: String,

    /// API key; absent means the provider is disabled
    pub api_key: Option<String>,

    /// API base URL, without a trailing slash
    pub base_url: String,

    /// Model identifier sent with each request
    pub model: String,

    /// Explicit selection priority; lower wins, missing sorts last
    pub priority: Option<u32>,
}

impl ProviderConfig {
    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Daily generation quotas per user tier
#[derive(Debug, Clone, Copy)]
pub struct QuotaConfig {
    pub free: u64,
    pub vip: u64,
    pub admin: u64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub host: String,

    /// API server port
    pub port: u16,

    /// Document store backing the service
    pub storage_backend: StorageBackend,

    /// Redis connection URL (when the backend is Redis)
    pub redis_url: String,

    /// Secret for signing and verifying access tokens
    pub jwt_secret: String,

    /// Candidate prompt-enhancement providers
    pub prompt_providers: Vec<ProviderConfig>,

    /// Candidate image-generation providers
    pub image_providers: Vec<ProviderConfig>,

    /// Daily quotas per tier
    pub quotas: QuotaConfig,

    /// Base unit of the linear persistence retry backoff, in milliseconds
    pub retry_unit_ms: u64,

    /// Simulated latency of the mock image generator, in milliseconds
    pub mock_latency_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("API_PORT")
                .unwrap_or_else(|_| "8090".to_string())
                .parse()
                .context("Invalid API_PORT")?,

            storage_backend: match env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .as_str()
            {
                "redis" => StorageBackend::Redis,
                _ => StorageBackend::Memory,
            },

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),

            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),

            prompt_providers: vec![ProviderConfig {
                name: "deepseek".to_string(),
                api_key: env::var("DEEPSEEK_API_KEY").ok(),
                base_url: env::var("DEEPSEEK_BASE_URL")
                    .unwrap_or_else(|_| "https://api.deepseek.com/v1".to_string()),
                model: env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string()),
                priority: Some(1),
            }],

            image_providers: vec![ProviderConfig {
                name: "zhipu".to_string(),
                api_key: env::var("ZHIPU_API_KEY").ok(),
                base_url: env::var("ZHIPU_BASE_URL")
                    .unwrap_or_else(|_| "https://open.bigmodel.cn/api/paas/v4".to_string()),
                model: env::var("ZHIPU_MODEL").unwrap_or_else(|_| "cogview-3".to_string()),
                priority: Some(1),
            }],

            quotas: QuotaConfig {
                free: env_u64("DAILY_LIMIT_FREE", 50)?,
                vip: env_u64("DAILY_LIMIT_VIP", 200)?,
                admin: env_u64("DAILY_LIMIT_ADMIN", 1000)?,
            },

            retry_unit_ms: env_u64("PERSIST_RETRY_UNIT_MS", 1000)?,

            mock_latency_ms: env_u64("MOCK_LATENCY_MS", 2000)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.quotas.free == 0 || self.quotas.vip == 0 || self.quotas.admin == 0 {
            anyhow::bail!("Daily limits must be greater than 0");
        }

        if self.storage_backend == StorageBackend::Redis && self.redis_url.is_empty() {
            anyhow::bail!("REDIS_URL is required when STORAGE_BACKEND=redis");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(value) => value.parse().with_context(|| format!("Invalid {name}")),
        Err(_) => Ok(default),
    }
}
