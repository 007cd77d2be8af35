//! AI Image Generation Service
//!
//! Backend-for-frontend turning a text prompt into a generated image, with
//! provider fallback, daily usage limits and retry/backup persistence.

use anyhow::{Context, Result};
use generation_service::{
    create_router, AppState, Config, DocumentStore, MemoryStore, RedisStore, StorageBackend,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "generation_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Starting AI image generation service");
    info!(
        "Prompt providers enabled: {}",
        config.prompt_providers.iter().filter(|p| p.enabled()).count()
    );
    info!(
        "Image providers enabled: {}",
        config.image_providers.iter().filter(|p| p.enabled()).count()
    );

    let store: Arc<dyn DocumentStore> = match config.storage_backend {
        StorageBackend::Redis => {
            info!("Storage backend: Redis at {}", config.redis_url);
            Arc::new(
                RedisStore::new(&config.redis_url)
                    .await
                    .context("Failed to initialize storage")?,
            )
        }
        StorageBackend::Memory => {
            info!("Storage backend: in-memory");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = config.api_address();
    let state = AppState::new(config, store);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("Generation service running on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
