//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod notification;
mod proposal;

use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Dashboard
        .route("/api/overview", get(proposal::overview))
        .route("/api/proposals", get(proposal::list_proposals))
        .route("/api/proposals/{id}", get(proposal::get_proposal))
        .route("/api/proposals/{id}/status", post(proposal::update_status))
        .route("/api/refresh", get(proposal::wait_for_refresh))

        // Notifications
        .route("/api/notifications", get(notification::list_notifications))

        // Apply middleware and state
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    cors.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{MemoryStore, Proposal, Specialist};
    use crate::state::AppState;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_with(store: Arc<MemoryStore>) -> Router {
        let mut settings = Settings::default();
        settings.workflow.refresh_poll = Duration::from_millis(50);
        let state = Arc::new(AppState::with_backend(store, &settings));
        create_router(state, &settings)
    }

    fn seeded() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::with_proposals(vec![
                Proposal::new("1718900000000001", "user-1", Specialist::Fabricio).with_client("Ana Lima"),
                Proposal::new("1718900000000002", "user-2", Specialist::Suzana).with_client("Caio Reis"),
            ])
            .with_user_count(2),
        )
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn fetch(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app_with(seeded()), fetch("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
    }

    #[tokio::test]
    async fn test_overview() {
        let (status, body) = send(app_with(seeded()), fetch("/api/overview")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalProposals"], json!(2));
        assert_eq!(body["data"]["totalUsers"], json!(2));
        assert_eq!(body["data"]["pendingProposals"], json!(2));
        assert_eq!(body["data"]["recent"][0]["code"].as_str().map(str::len), Some(6));
    }

    #[tokio::test]
    async fn test_list_by_specialist() {
        let (status, body) = send(app_with(seeded()), fetch("/api/proposals?specialist=suzana")).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["clientName"], json!("Caio Reis"));
    }

    #[tokio::test]
    async fn test_get_missing_proposal() {
        let (status, body) = send(app_with(seeded()), fetch("/api/proposals/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], json!("NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_reject_via_api() {
        let store = seeded();
        let (status, body) = send(
            app_with(store.clone()),
            post_json(
                "/api/proposals/1718900000000001/status",
                json!({ "status": "rejected", "observation": "income insufficient" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["proposal"]["status"], json!("rejected"));
        assert_eq!(body["data"]["proposal"]["observation"], json!("income insufficient"));
        assert_eq!(body["data"]["notification"]["userId"], json!("user-1"));

        let (_, feed) = send(app_with(store), fetch("/api/notifications?userId=user-1")).await;
        assert_eq!(feed["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_observation_via_api() {
        let store = seeded();
        let (status, body) = send(
            app_with(store.clone()),
            post_json("/api/proposals/1718900000000002/status", json!({ "status": "pending" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("VALIDATION_ERROR"));
        assert!(store.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_times_out_quietly() {
        let (status, body) = send(app_with(seeded()), fetch("/api/refresh")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["refreshed"], json!(false));
    }
}
