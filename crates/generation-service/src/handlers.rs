//! API request handlers
//!
//! Thin layer mapping HTTP requests onto the generation service; every
//! response uses the `{code, message, data}` envelope.

use aigen_common::{ApiResponse, Error};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::auth;
use crate::config::Config;
use crate::models::User;
use crate::service::{GenerateRequest, GenerationService};
use crate::storage::DocumentStore;
use crate::users;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub service: GenerationService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        let service = GenerationService::new(config.clone(), store.clone());
        Self {
            config,
            store,
            service,
        }
    }
}

/// API error answering with the envelope; the body code mirrors the status
#[derive(Debug)]
pub struct ApiError(pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ApiResponse::error(code, self.0.to_string());

        (status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub device_id: String,
    pub nickname: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_info: UserInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub nickname: String,
    pub vip_level: u32,
    pub credits: i64,
    pub generate_count: u64,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            nickname: user.nickname.clone(),
            vip_level: user.vip_level,
            credits: user.credits,
            generate_count: user.generate_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub prompt: String,
    pub character: Option<String>,
    #[serde(default = "default_style")]
    pub style: String,
}

fn default_style() -> String {
    "cartoon".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

const MAX_PAGE_SIZE: u64 = 50;

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "generation-service"
    }))
}

/// Guest login: find or create the user for a device id, issue a token
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let device_id = payload.device_id.trim();
    if device_id.is_empty() {
        return Err(Error::Validation("deviceId must not be empty".to_string()).into());
    }

    let nickname = payload.nickname.as_deref().unwrap_or("guest");
    let user = users::find_or_create(state.store.as_ref(), device_id, nickname).await?;
    let token = auth::issue_token(&state.config.jwt_secret, &user.id)?;

    Ok(Json(ApiResponse::ok_with_message(
        "login successful",
        LoginResponse {
            token,
            user_info: UserInfo::from(&user),
        },
    )))
}

/// Run one generation attempt for the authenticated user
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(payload): Json<GenerateBody>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Generate request from user {}", user.id);

    let outcome = state
        .service
        .generate(
            &user,
            GenerateRequest {
                prompt: payload.prompt,
                character: payload.character,
                style: payload.style,
            },
        )
        .await?;

    Ok(Json(ApiResponse::ok_with_message(
        "image generated",
        outcome,
    )))
}

/// List the authenticated user's works
pub async fn works_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);
    let history = state.service.history(&user, query.page, page_size).await?;

    Ok(Json(ApiResponse::ok(history)))
}

/// Single work detail
pub async fn work_detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(work_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let work = state.service.work_detail(&user, &work_id).await?;

    Ok(Json(ApiResponse::ok(json!({
        "workId": work.id,
        "title": work.title,
        "imageUrl": work.image_url,
        "prompt": work.prompt,
        "enhancedPrompt": work.enhanced_prompt,
        "style": work.style,
        "status": work.status,
        "createdAt": work.created_at,
    }))))
}

/// Configured providers and overall availability
pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.service.status()))
}

/// Today's usage against the user's daily quota
pub async fn usage_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let usage = state.service.daily_usage(&user).await?;

    Ok(Json(ApiResponse::ok(usage)))
}
