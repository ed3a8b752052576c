//! Device registration and token checks.
//!
//! These tests require a running PostgreSQL database (DATABASE_URL).

mod common;

use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::TestServer;

use common::fixtures;
use common::TestContext;

#[tokio::test]
#[ignore = "requires database"]
async fn test_register_issues_token() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/device/register")
        .json(&fixtures::device_register_request(Some("Pixel")))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let token = body["token"].as_str().unwrap();
    assert!(token.len() > 10);

    let device = ctx.get_device_by_token(token).await.unwrap();
    assert_eq!(device.name.as_deref(), Some("Pixel"));
    assert_eq!(body["device_id"].as_str().unwrap(), device.id.to_string());

    ctx.cleanup_device(device.id).await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_register_without_body() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server.post("/api/device/register").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let device_id = uuid::Uuid::parse_str(body["device_id"].as_str().unwrap()).unwrap();
    ctx.cleanup_device(device_id).await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_status_with_valid_token() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (device_id, token) = ctx.create_test_device(None).await;

    let response = server
        .get("/api/device/status")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["device_id"].as_str().unwrap(), device_id.to_string());

    ctx.cleanup_device(device_id).await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_status_with_unknown_token() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    server
        .get("/api/device/status")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-device"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_requests_refresh_last_seen() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (device_id, token) = ctx.create_test_device(None).await;
    let before = ctx.get_device_by_token(&token).await.unwrap().last_seen_at;

    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    server
        .get("/api/device/status")
        .add_header(AUTHORIZATION, TestContext::auth_header_value(&token))
        .await
        .assert_status_ok();

    let after = ctx.get_device_by_token(&token).await.unwrap().last_seen_at;
    assert!(after > before);

    ctx.cleanup_device(device_id).await;
}
