//! AI image generation backend
//!
//! Two-step generation flow (prompt enhancement, then image generation with a
//! silent mock fallback), a per-user daily usage ledger and retry/backup
//! persistence over a pluggable document store.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod persist;
pub mod providers;
pub mod service;
pub mod storage;
pub mod users;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::{Config, StorageBackend};
pub use handlers::AppState;
pub use service::GenerationService;
pub use storage::{DocumentStore, MemoryStore, RedisStore};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    let protected = Router::new()
        .route("/api/ai/generate", post(handlers::generate_handler))
        .route("/api/ai/works", get(handlers::works_handler))
        .route("/api/ai/work/{work_id}", get(handlers::work_detail_handler))
        .route("/api/ai/status", get(handlers::status_handler))
        .route("/api/ai/usage", get(handlers::usage_handler))
        .route_layer(middleware::from_fn_with_state(
            shared_state.clone(),
            auth::require_user,
        ));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/auth/login", post(handlers::login_handler))
        .merge(protected)
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
