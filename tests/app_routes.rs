use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use call_context::app::{create_app, AppState};
use call_context::config::Settings;

fn app(vars: &'static [(&'static str, &'static str)]) -> axum::Router {
    let settings = Settings::from_lookup(|key| {
        vars.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .expect("settings");
    create_app(AppState::new(settings))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn echo_reports_propagated_identifiers() {
    let response = app(&[])
        .oneshot(
            Request::builder()
                .uri("/echo")
                .header("x-request-id", "abc-123")
                .header("x-user-id", "u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let body = json_body(response).await;
    assert_eq!(body["identifiers"]["request_id"], "abc-123");
    assert_eq!(body["identifiers"]["user_id"], "u1");
    assert!(body["identifiers"].get("session_id").is_none());
    assert_eq!(body["ambient"]["request_id"], "abc-123");
    assert_eq!(body["ambient"]["user_id"], "u1");
    assert_eq!(body["background_request_id"], "abc-123");
}

#[tokio::test]
async fn echo_generates_request_id_and_skips_empty_user() {
    let response = app(&[])
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/echo")
                .header("x-session-id", "s1")
                .header("x-user-id", "")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let echoed = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();
    let body = json_body(response).await;

    let request_id = body["ambient"]["request_id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
    assert_eq!(request_id, echoed);
    assert_eq!(body["ambient"]["session_id"], "s1");
    assert!(body["ambient"].get("user_id").is_none());
}

#[tokio::test]
async fn echo_header_follows_settings() {
    let response = app(&[("ECHO_REQUEST_ID", "false")])
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("x-request-id"));

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}
