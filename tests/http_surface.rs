//! End-to-end tests of the owning service's HTTP surface.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use trust_gateway::http::{build_router, AppState};

mod common;
use common::{Step, ScriptedTransport, IDENTITY};

fn app(transport: Arc<ScriptedTransport>) -> Router {
    let config = common::test_config();
    let registry = common::registry(&config);
    let verifier = Arc::new(common::verifier(&config, transport, &registry));
    build_router(AppState {
        verifier,
        registry,
        request_timeout: config.service.request_timeout(),
    })
}

fn session_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/v1/session");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_session_returns_verified_identity() {
    let transport = ScriptedTransport::new(vec![Step::Respond(200, IDENTITY)]);
    let response = app(transport.clone()).oneshot(session_request(Some("tok"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({ "user_id": "u-42", "role": "admin" }));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_missing_credential_never_calls_upstream() {
    let transport = ScriptedTransport::new(vec![]);
    let response = app(transport.clone()).oneshot(session_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_rejected_credential_maps_to_unauthorized() {
    let transport =
        ScriptedTransport::new(vec![Step::Respond(401, r#"{"error":"token revoked"}"#)]);
    let response = app(transport).oneshot(session_request(Some("tok"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
    let body = json_body(response).await;
    assert_eq!(body["error"], "fatal_response");
    assert!(body["message"].as_str().unwrap().contains("token revoked"));
}

#[tokio::test]
async fn test_forbidden_maps_to_forbidden() {
    let transport = ScriptedTransport::new(vec![Step::Respond(403, "")]);
    let response = app(transport).oneshot(session_request(Some("tok"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_dependency_is_retryable_503() {
    let transport = ScriptedTransport::with_fallback(vec![], Step::Respond(503, ""));
    let router = app(transport.clone());

    let response = router.clone().oneshot(session_request(Some("tok"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    // Breaker cool-down of 5s.
    assert_eq!(response.headers()[header::RETRY_AFTER], "5");
    assert_eq!(json_body(response).await["error"], "remote_unavailable");

    let response = router.clone().oneshot(session_request(Some("tok"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "breaker_open");
    assert_eq!(transport.calls(), 3);

    let response = router
        .oneshot(Request::builder().uri("/health/dependencies").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["dependencies"][0]["dependency"], "identity");
    assert_eq!(body["dependencies"][0]["state"], "open");
}

#[tokio::test]
async fn test_dependency_health_when_closed() {
    let transport = ScriptedTransport::new(vec![]);
    let response = app(transport)
        .oneshot(Request::builder().uri("/health/dependencies").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dependencies"][0]["state"], "closed");
}
