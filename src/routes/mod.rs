//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static lesson SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers); tighten for production
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/lessons", get(http::http_get_lessons))
        .route("/api/v1/sessions", post(http::http_post_session))
        .route(
            "/api/v1/sessions/:id",
            get(http::http_get_session).delete(http::http_delete_session),
        )
        .route("/api/v1/sessions/:id/reveal", post(http::http_post_reveal))
        .route("/api/v1/sessions/:id/input", post(http::http_post_input))
        .route("/api/v1/sessions/:id/advance", post(http::http_post_advance))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::with_parts(&LabConfig::default(), None));
        (build_router(state.clone()), state)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn lists_the_catalog() {
        let (app, _) = app();
        let (status, body) = call(&app, "GET", "/api/v1/lessons", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 7);
        assert_eq!(body[0]["id"], "remember");
    }

    #[tokio::test]
    async fn unknown_lesson_and_session_are_404() {
        let (app, _) = app();
        let (status, _) = call(&app, "POST", "/api/v1/sessions", Some(json!({"lessonId": "nope"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = call(&app, "GET", "/api/v1/sessions/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn session_walks_through_the_navigation_lesson() {
        let (app, state) = app();
        let (status, body) = call(&app, "POST", "/api/v1/sessions", Some(json!({"lessonId": "navigation"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["sessionId"].as_str().unwrap().to_string();
        assert_eq!(body["step"]["stage"]["view_type"], "IMAGE");
        assert_eq!(body["can_proceed"], false);

        // Locked until the dialogue is revealed.
        let (status, _) = call(&app, "POST", &format!("/api/v1/sessions/{id}/advance"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Image step, then code step.
        for _ in 0..2 {
            call(&app, "POST", &format!("/api/v1/sessions/{id}/reveal"), None).await;
            let (status, _) = call(&app, "POST", &format!("/api/v1/sessions/{id}/advance"), None).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = call(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(body["step"]["stage"]["exercise"]["mode"], "NAVIGATION_CRASH");
        assert_eq!(body["exercise_phase"], "idle");

        let (status, body) = call(&app, "POST", &format!("/api/v1/sessions/{id}/input"), Some(json!({"kind": "trigger"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["feedback"]["kind"], "crash");

        call(&app, "POST", &format!("/api/v1/sessions/{id}/reveal"), None).await;
        let (status, _) = call(&app, "POST", &format!("/api/v1/sessions/{id}/advance"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(&app, "DELETE", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn input_on_a_non_interactive_step_is_rejected() {
        let (app, _) = app();
        let (_, body) = call(&app, "POST", "/api/v1/sessions", Some(json!({"lessonId": "remember"}))).await;
        let id = body["sessionId"].as_str().unwrap().to_string();
        let (status, _) = call(&app, "POST", &format!("/api/v1/sessions/{id}/input"), Some(json!({"kind": "tap"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
