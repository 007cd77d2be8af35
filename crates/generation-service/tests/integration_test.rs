//! Integration tests for the generation service API

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use generation_service::config::{ProviderConfig, QuotaConfig};
use generation_service::persist::WORKS_COLLECTION;
use generation_service::storage::Filter;
use generation_service::{
    create_router, AppState, Config, DocumentStore, MemoryStore, StorageBackend,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8090,
        storage_backend: StorageBackend::Memory,
        redis_url: String::new(),
        jwt_secret: "integration-secret".to_string(),
        prompt_providers: vec![ProviderConfig {
            name: "deepseek".to_string(),
            api_key: None,
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            priority: Some(1),
        }],
        image_providers: vec![ProviderConfig {
            name: "zhipu".to_string(),
            api_key: None,
            base_url: "https://open.bigmodel.cn/api/paas/v4".to_string(),
            model: "cogview-3".to_string(),
            priority: Some(1),
        }],
        quotas: QuotaConfig {
            free: 50,
            vip: 200,
            admin: 1000,
        },
        retry_unit_ms: 0,
        mock_latency_ms: 0,
    }
}

fn create_test_app(config: Config) -> (axum::Router, Arc<dyn DocumentStore>) {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let app = create_router(AppState::new(config, store.clone()));
    (app, store)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn login(app: &axum::Router, device_id: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/login")
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_string(&json!({ "deviceId": device_id })).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn post_generate(app: &axum::Router, token: &str, payload: Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri("/api/ai/generate")
                .method("POST")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(serde_json::to_string(&payload).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get_authed(app: &axum::Router, token: &str, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _store) = create_test_app(test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "generation-service");
}

#[tokio::test]
async fn test_generate_requires_token() {
    let (app, _store) = create_test_app(test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/ai/generate")
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt": "a cute cat"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["code"], 401);
    assert!(body["message"].as_str().unwrap().contains("missing access token"));
}

#[tokio::test]
async fn test_generate_rejects_bad_token() {
    let (app, _store) = create_test_app(test_config());

    let response = post_generate(&app, "bogus", json!({ "prompt": "a cute cat" })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_generate_end_to_end_with_mock_providers() {
    let (app, _store) = create_test_app(test_config());
    let token = login(&app, "device-1").await;

    let response = post_generate(
        &app,
        &token,
        json!({ "prompt": "a cute cat", "style": "cartoon" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["code"], 200);
    assert_eq!(
        body["data"]["enhancedPrompt"],
        "A beautiful a cute cat, detailed digital art, high quality, cartoon style"
    );

    let image_url = body["data"]["imageUrl"].as_str().unwrap();
    assert!(image_url.starts_with("https://picsum.photos/1024/1024?random="));

    assert_eq!(body["data"]["dailyUsage"]["used"], 1);
    assert_eq!(body["data"]["dailyUsage"]["limit"], 50);
    assert_eq!(body["data"]["dailyUsage"]["remaining"], 49);
}

#[tokio::test]
async fn test_generate_validates_prompt_length() {
    let (app, _store) = create_test_app(test_config());
    let token = login(&app, "device-1").await;

    let response = post_generate(&app, &token, json!({ "prompt": "   " })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_generate(&app, &token, json!({ "prompt": "x".repeat(501) })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], 400);
    assert!(body["message"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_generate_rejects_exhausted_quota() {
    // Providers enabled but unreachable: a quota rejection that wrongly
    // reached the prompt stage would surface as a 500 with a failed record.
    let mut config = test_config();
    config.prompt_providers[0].api_key = Some("key".to_string());
    config.prompt_providers[0].base_url = "http://127.0.0.1:9".to_string();
    config.image_providers[0].api_key = Some("key".to_string());
    config.image_providers[0].base_url = "http://127.0.0.1:9".to_string();

    let (app, store) = create_test_app(config);
    let token = login(&app, "device-1").await;

    let user_doc = store
        .find_one("users", &Filter::new())
        .await
        .unwrap()
        .unwrap();
    let user_id = user_doc["id"].as_str().unwrap();

    for _ in 0..50 {
        store
            .insert_one(
                WORKS_COLLECTION,
                json!({
                    "user_id": user_id,
                    "status": "completed",
                    "created_at": chrono::Utc::now().to_rfc3339(),
                }),
            )
            .await
            .unwrap();
    }

    let response = post_generate(&app, &token, json!({ "prompt": "one more cat" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], 400);
    assert!(body["message"].as_str().unwrap().contains("50/50"));

    // No 51st record of any status was written and no provider was reached.
    let works = store.find(WORKS_COLLECTION, &Filter::new()).await.unwrap();
    assert_eq!(works.len(), 50);
    assert!(works.iter().all(|work| work["status"] == "completed"));
}

#[tokio::test]
async fn test_image_provider_failure_still_succeeds() {
    let mut config = test_config();
    config.image_providers[0].api_key = Some("key".to_string());
    // Nothing listens here; the provider call fails fast and falls back.
    config.image_providers[0].base_url = "http://127.0.0.1:9".to_string();

    let (app, store) = create_test_app(config);
    let token = login(&app, "device-1").await;

    let response = post_generate(&app, &token, json!({ "prompt": "a cute cat" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["data"]["imageUrl"]
        .as_str()
        .unwrap()
        .starts_with("https://picsum.photos/"));

    let works = store.find(WORKS_COLLECTION, &Filter::new()).await.unwrap();
    assert_eq!(works[0]["image_service"], "mock");
    assert_eq!(works[0]["status"], "completed");
}

#[tokio::test]
async fn test_works_listing_and_detail() {
    let (app, _store) = create_test_app(test_config());
    let token = login(&app, "device-1").await;

    let response = post_generate(&app, &token, json!({ "prompt": "a red fox" })).await;
    let work_id = body_json(response).await["data"]["workId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = get_authed(&app, &token, "/api/ai/works?page=1&pageSize=10").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);
    assert_eq!(body["data"]["list"][0]["prompt"], "a red fox");
    assert_eq!(body["data"]["list"][0]["status"], "completed");

    let response = get_authed(&app, &token, &format!("/api/ai/work/{work_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["workId"], work_id.as_str());

    let response = get_authed(&app, &token, "/api/ai/work/not-a-work").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_works_listing_survives_huge_page_number() {
    let (app, _store) = create_test_app(test_config());
    let token = login(&app, "device-1").await;

    post_generate(&app, &token, json!({ "prompt": "a red fox" })).await;

    let uri = format!("/api/ai/works?page={}&pageSize=50", u64::MAX);
    let response = get_authed(&app, &token, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);
    assert!(body["data"]["list"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_status_reports_disabled_providers() {
    let (app, _store) = create_test_app(test_config());
    let token = login(&app, "device-1").await;

    let response = get_authed(&app, &token, "/api/ai/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["available"], false);

    let services = body["data"]["services"].as_array().unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(services[0]["name"], "deepseek");
    assert_eq!(services[0]["type"], "prompt_generator");
    assert_eq!(services[0]["enabled"], false);
    assert_eq!(services[1]["name"], "zhipu");
    assert_eq!(services[1]["type"], "image_generator");
}

#[tokio::test]
async fn test_daily_usage_endpoint() {
    let (app, _store) = create_test_app(test_config());
    let token = login(&app, "device-1").await;

    let response = get_authed(&app, &token, "/api/ai/usage").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["used"], 0);
    assert_eq!(body["data"]["limit"], 50);
    assert_eq!(body["data"]["remaining"], 50);
    assert!(body["data"]["resetAt"].is_string());

    post_generate(&app, &token, json!({ "prompt": "a cat" })).await;

    let response = get_authed(&app, &token, "/api/ai/usage").await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["used"], 1);
    assert_eq!(body["data"]["remaining"], 49);
}

#[tokio::test]
async fn test_login_creates_and_reuses_user() {
    let (app, store) = create_test_app(test_config());

    login(&app, "device-1").await;
    login(&app, "device-1").await;

    let users = store.find("users", &Filter::new()).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["credits"], 100);
}
